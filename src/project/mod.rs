//! Projects, their events and the control-thread context that drives them.

pub mod context;
pub mod events;
#[allow(clippy::module_inception)]
pub mod project;
