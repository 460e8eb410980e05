//! Saved project documents and their formatters.

pub mod document;
pub mod formatter;
