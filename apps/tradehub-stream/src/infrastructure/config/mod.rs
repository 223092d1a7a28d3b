//! Configuration
//!
//! Environment-backed settings for the streaming session.

pub mod settings;

pub use settings::{
    ConfigError, DEFAULT_API_BASE_URL, DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_WS_URL,
    StreamSettings,
};
