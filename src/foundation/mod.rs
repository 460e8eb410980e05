//! Shared time, metadata and error primitives.

pub mod core;
pub mod error;
pub mod meta;
