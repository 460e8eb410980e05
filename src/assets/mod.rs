//! Asset identity, caching and background resolution.

pub mod asset;
pub mod cache;
pub(crate) mod loader;
pub mod media;
pub mod proxy;
pub mod registry;
