//! Layers, clips, tracks and keyframed track elements.

pub mod clip;
pub mod control;
pub mod element;
pub mod layer;
pub mod track;
#[allow(clippy::module_inception)]
pub mod timeline;
