//! Unified error handling for the sync client.

use thiserror::Error;

/// All possible errors from the sync client.
///
/// Transient network failures (transport, remote CRUD) are retried by the
/// engine; storage failures are fatal to the current operation and always
/// surfaced, because a failed write must not be mistaken for a successful
/// sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("transport error: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("remote API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("engine error: {0}")]
    Engine(#[from] tether_engine::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("engine has not been initialized")]
    NotInitialized,
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Transport(Box::new(e))
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, SyncError>;
