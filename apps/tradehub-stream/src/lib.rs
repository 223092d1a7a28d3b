#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! TradeHub Stream - Market Data Streaming Session
//!
//! A client library for the TradeHub streaming platform: it provisions
//! the remote streaming slot over REST, maintains one WebSocket
//! connection, manages market and depth subscriptions, keeps the link
//! alive, and delivers inbound traffic to a single consumer as an
//! ordered stream.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no external integrations
//!   - `instrument`: Instrument keys and data classes
//!   - `subscription`: Intent registry per data class
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `tradehub`: Session control REST client, streaming session,
//!     control-frame codec, inbound dispatcher, keep-alive ticker
//!   - `config`: Configuration loaded from the environment
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────────────┐     ┌───────────────┐
//! TradeHub WS ──────►│   Reader Loop    │────►│ MessageStream │────► Consumer
//!      ▲             └──────────────────┘     └───────────────┘
//!      │             ┌──────────────────┐
//!      ├─────────────│ StreamingSession │◄──── subscribe / keep-alive
//!      │             └──────────────────┘
//! TradeHub REST ◄──── invalidate / create session
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core instrument and subscription types.
pub mod domain;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{
    DataClass, InstrumentKey, KEY_DELIMITER, LIST_DELIMITER, instrument_key, join_keys, split_keys,
};
pub use domain::subscription::{RegistryStats, SubscriptionRegistry};

// Infrastructure config
pub use infrastructure::config::{ConfigError, StreamSettings};

// Streaming session
pub use infrastructure::tradehub::{
    DisconnectReason, InboundMessage, KeepAliveConfig, MessagePayload, MessageStream, SessionError,
    SessionEvent, SessionState, StreamingSession,
};

// Session control (for integration tests)
pub use infrastructure::tradehub::{SessionControlClient, SessionControlError};

// Control frames (for integration tests)
pub use infrastructure::tradehub::{ConnectAck, ConnectRequest, HeartbeatFrame, SubscriptionRequest};
