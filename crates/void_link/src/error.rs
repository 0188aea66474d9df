//! Error types for the link layer

use thiserror::Error;

/// Link layer errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// Operation invoked outside the lifecycle phase that supports it
    #[error("Link not initialized: {0}")]
    NotInitialized(String),

    /// Unrecognized mode, malformed description element, bad index
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Collision name already used on the same link
    #[error("Duplicate collision name: {0}")]
    DuplicateName(String),

    /// The physics backend could not allocate, activate or release its body
    #[error("Physics backend failure: {0}")]
    BackendFailure(String),

    /// A joint or its endpoint outlived the link it refers to
    #[error("Dangling joint reference: {0}")]
    DanglingJointReference(String),

    /// Description text could not be parsed
    #[error("Malformed link description: {0}")]
    Description(#[from] serde_json::Error),
}

impl LinkError {
    /// Whether this error describes a bad input rather than a lifecycle or backend problem
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::Description(_))
    }
}

/// Result type for link operations
pub type Result<T> = std::result::Result<T, LinkError>;
