//! Configuration for the sync client.

use std::env;
use std::time::Duration;
use tether_engine::{Resolution, DEFAULT_TOLERANCE_MS};

/// Queue items are dropped after this many recorded remote failures.
pub const DEFAULT_RETRY_CEILING: u32 = 3;

/// First reconnect delay; doubles on every further attempt.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Reconnect attempts before the transport parks as disconnected.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 6;

/// Sync client configuration.
///
/// The conflict tolerance window and the retry ceiling are bounded
/// parameters, not invariants; the defaults match the production relay.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// WebSocket URL of the sync relay
    pub relay_url: String,
    /// Base URL of the entity CRUD API
    pub api_base_url: String,
    /// Divergence window (ms) below which concurrent edits are absorbed
    pub tolerance_ms: u64,
    /// Recorded failures after which a queue item is dropped
    pub retry_ceiling: u32,
    /// Base delay for exponential reconnect backoff
    pub reconnect_base_delay: Duration,
    /// Reconnect attempts before giving up until the next reachable edge
    pub max_reconnect_attempts: u32,
    /// Resolve incoming conflicts automatically with this decision;
    /// `None` parks them for the caller
    pub default_resolution: Option<Resolution>,
}

impl SyncConfig {
    /// Configuration with default tuning for the given endpoints.
    pub fn new(relay_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            api_base_url: api_base_url.into(),
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            default_resolution: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let relay_url = env::var("TETHER_RELAY_URL").map_err(|_| ConfigError::MissingRelayUrl)?;
        let api_base_url = env::var("TETHER_API_URL").map_err(|_| ConfigError::MissingApiUrl)?;

        let mut config = Self::new(relay_url, api_base_url);

        if let Ok(value) = env::var("TETHER_TOLERANCE_MS") {
            config.tolerance_ms = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TETHER_TOLERANCE_MS"))?;
        }
        if let Ok(value) = env::var("TETHER_RETRY_CEILING") {
            config.retry_ceiling = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TETHER_RETRY_CEILING"))?;
        }

        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TETHER_RELAY_URL environment variable is required")]
    MissingRelayUrl,

    #[error("TETHER_API_URL environment variable is required")]
    MissingApiUrl,

    #[error("Invalid value for {0}")]
    InvalidValue(&'static str),
}
