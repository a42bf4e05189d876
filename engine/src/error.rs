//! Error types for the Tether engine.

use thiserror::Error;

/// All possible errors from the Tether engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed payload for kind '{kind}': {reason}")]
    MalformedPayload { kind: String, reason: String },

    #[error("change event for '{0}' carries no payload")]
    MissingPayload(String),

    #[error("malformed sync snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("unknown queue operation: {0}")]
    UnknownOperation(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
