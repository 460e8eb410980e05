/// Convenience result type used across cutlist.
pub type EditResult<T> = Result<T, EditError>;

/// Top-level error taxonomy used by the editing model.
#[derive(thiserror::Error, Debug)]
pub enum EditError {
    /// An asset id could not be resolved (missing capability, bad reference).
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Duplicate membership or creation.
    #[error("duplicate error: {0}")]
    Duplicate(String),

    /// Structural rule violated (priority collision, medium mismatch, non-member).
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Malformed or unsupported persisted form.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A cancellable batch was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Invalid caller-provided argument.
    #[error("validation error: {0}")]
    Validation(String),

    /// Filesystem failure while reading or writing a project.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EditError {
    /// Build an [`EditError::Resolution`] value.
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Build an [`EditError::Duplicate`] value.
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    /// Build an [`EditError::Consistency`] value.
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    /// Build an [`EditError::Serialization`] value.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Build an [`EditError::Cancelled`] value.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Build an [`EditError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
