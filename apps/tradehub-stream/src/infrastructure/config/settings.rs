//! Stream Client Settings
//!
//! Endpoint and timing configuration for the streaming session. Every
//! value has a platform default and can be overridden from the
//! environment; credentials are not configuration and arrive as
//! constructor arguments instead.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TRADEHUB_API_BASE_URL` | platform REST base | Session-control endpoint base |
//! | `TRADEHUB_WS_URL` | platform stream URL | Streaming WebSocket endpoint |
//! | `TRADEHUB_REQUEST_TIMEOUT_SECS` | `10` | Session-control HTTP timeout |
//! | `TRADEHUB_HANDSHAKE_TIMEOUT_SECS` | `10` | Stream handshake reply timeout |
//! | `TRADEHUB_KEEP_ALIVE_SECS` | `10` | Default keep-alive period |

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Defaults
// =============================================================================

/// Production REST base for session control.
pub const DEFAULT_API_BASE_URL: &str = "https://api.tradehub.codifi.in/rest/TradeHubApi";

/// Production streaming endpoint.
pub const DEFAULT_WS_URL: &str = "wss://stream.tradehub.codifi.in/NorenWS";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Keep-alive period the platform documents for its feed.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is set but empty.
    #[error("environment variable {0} is set but empty")]
    EmptyValue(String),
}

// =============================================================================
// Settings
// =============================================================================

/// Endpoint and timing configuration for a streaming session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// REST base URL for the session-control endpoints.
    pub api_base_url: String,
    /// WebSocket URL of the streaming feed.
    pub ws_url: String,
    /// Timeout for each session-control HTTP round trip.
    pub request_timeout: Duration,
    /// How long to wait for the connect acknowledgement after the upgrade.
    pub handshake_timeout: Duration,
    /// Keep-alive period used when the caller does not pick one.
    pub keep_alive_interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}

impl StreamSettings {
    /// Load settings from the environment, falling back to platform
    /// defaults for anything unset. Numeric variables that fail to parse
    /// fall back silently; URL variables set to an empty string are an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyValue`] if a URL variable is set but
    /// empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_env_url("TRADEHUB_API_BASE_URL", DEFAULT_API_BASE_URL)?,
            ws_url: parse_env_url("TRADEHUB_WS_URL", DEFAULT_WS_URL)?,
            request_timeout: parse_env_duration_secs(
                "TRADEHUB_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT,
            ),
            handshake_timeout: parse_env_duration_secs(
                "TRADEHUB_HANDSHAKE_TIMEOUT_SECS",
                DEFAULT_HANDSHAKE_TIMEOUT,
            ),
            keep_alive_interval: parse_env_duration_secs(
                "TRADEHUB_KEEP_ALIVE_SECS",
                DEFAULT_KEEP_ALIVE_INTERVAL,
            ),
        })
    }

    /// Log the active settings at startup.
    pub fn log_settings(&self) {
        tracing::info!(
            api_base_url = %self.api_base_url,
            ws_url = %self.ws_url,
            request_timeout_secs = self.request_timeout.as_secs(),
            handshake_timeout_secs = self.handshake_timeout.as_secs(),
            keep_alive_secs = self.keep_alive_interval.as_secs(),
            "Stream settings loaded"
        );
    }
}

// =============================================================================
// Environment Parsing Helpers
// =============================================================================

fn parse_env_url(key: &str, default: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
        Ok(value) => Ok(value),
        Err(_) => Ok(default.to_string()),
    }
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

// =============================================================================
// Tests
// =============================================================================
