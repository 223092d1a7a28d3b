//! TradeHub Wire Frames
//!
//! Frame types for the streaming protocol's control traffic. Every control
//! frame is a small JSON text message with a single-letter request code in
//! the `t` field; instrument key lists travel in `k`, joined by `#`.
//!
//! # Wire Format (JSON)
//!
//! Connect handshake (first frame after the upgrade; `susertoken` is the
//! double SHA-256 digest of the session token, never the raw token):
//!
//! ```json
//! {"t":"c","uid":"TH10250","actid":"TH10250","susertoken":"9839...","source":"API"}
//! ```
//!
//! Subscribe market data for two instruments:
//!
//! ```json
//! {"t":"t","k":"NSE|26000#NSE|26009"}
//! ```
//!
//! Unsubscribe uses `u` (market) and `ud` (depth); depth subscribe uses
//! `d`. Keep-alive is `{"t":"h","k":""}`. The server acknowledges the
//! connect frame with `{"t":"ck","s":"OK"}` (or `"NOT_OK"` for a rejected
//! token); everything after that acknowledgement is feed traffic this
//! crate does not interpret.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::instrument::{DataClass, InstrumentKey, join_keys};

// =============================================================================
// Request Codes
// =============================================================================

const CODE_CONNECT: &str = "c";
const CODE_CONNECT_ACK: &str = "ck";
const CODE_SUBSCRIBE_MARKET: &str = "t";
const CODE_UNSUBSCRIBE_MARKET: &str = "u";
const CODE_SUBSCRIBE_DEPTH: &str = "d";
const CODE_UNSUBSCRIBE_DEPTH: &str = "ud";
const CODE_KEEP_ALIVE: &str = "h";

const ACK_STATUS_OK: &str = "OK";

/// Connection source tag the platform expects from API clients.
const CONNECT_SOURCE: &str = "API";

const fn subscribe_code(class: DataClass) -> &'static str {
    match class {
        DataClass::Market => CODE_SUBSCRIBE_MARKET,
        DataClass::Depth => CODE_SUBSCRIBE_DEPTH,
    }
}

const fn unsubscribe_code(class: DataClass) -> &'static str {
    match class {
        DataClass::Market => CODE_UNSUBSCRIBE_MARKET,
        DataClass::Depth => CODE_UNSUBSCRIBE_DEPTH,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A frame failed to serialize or parse as JSON.
    #[error("frame codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    /// The first frame after the upgrade was not a connect acknowledgement.
    #[error("unexpected handshake frame: {0}")]
    UnexpectedHandshake(String),
}

// =============================================================================
// Token Digest
// =============================================================================

/// Hex SHA-256 of the hex SHA-256 of the session token.
///
/// The platform never accepts the raw token on the stream; the handshake
/// carries this double digest instead.
#[must_use]
pub fn digest_token(token: &str) -> String {
    let first = hex::encode(Sha256::digest(token.as_bytes()));
    hex::encode(Sha256::digest(first.as_bytes()))
}

// =============================================================================
// Connect Handshake
// =============================================================================

/// The handshake frame sent immediately after the WebSocket upgrade.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Request code, always `"c"`.
    #[serde(rename = "t")]
    pub request_code: String,
    /// Platform user id.
    #[serde(rename = "uid")]
    pub user_id: String,
    /// Account id; the platform uses the user id for API clients.
    #[serde(rename = "actid")]
    pub account_id: String,
    /// Double SHA-256 digest of the session token.
    #[serde(rename = "susertoken")]
    pub token_digest: String,
    /// Client source tag, always `"API"`.
    #[serde(rename = "source")]
    pub source: String,
}

impl ConnectRequest {
    /// Build the handshake frame for a user and session token.
    #[must_use]
    pub fn new(user_id: &str, session_token: &str) -> Self {
        Self {
            request_code: CODE_CONNECT.to_string(),
            user_id: user_id.to_string(),
            account_id: user_id.to_string(),
            token_digest: digest_token(session_token),
            source: CONNECT_SOURCE.to_string(),
        }
    }

    /// Serialize to the JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Codec`] if serialization fails.
    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The server's reply to a [`ConnectRequest`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectAck {
    /// Reply code, `"ck"` on a handshake reply.
    #[serde(rename = "t")]
    pub reply_code: String,
    /// `"OK"` when the session was accepted.
    #[serde(rename = "s", default)]
    pub status: String,
}

impl ConnectAck {
    /// Parse a handshake reply from its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Codec`] for unparseable JSON and
    /// [`FrameError::UnexpectedHandshake`] when the frame parses but is
    /// not a connect acknowledgement.
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let ack: Self = serde_json::from_str(text)?;
        if ack.reply_code == CODE_CONNECT_ACK {
            Ok(ack)
        } else {
            Err(FrameError::UnexpectedHandshake(text.to_string()))
        }
    }

    /// Whether the server accepted the streaming session.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.status == ACK_STATUS_OK
    }
}

// =============================================================================
// Subscription Control
// =============================================================================

/// A subscribe or unsubscribe control frame for one data class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionRequest {
    /// Single-letter request code (`t`/`u` market, `d`/`ud` depth).
    #[serde(rename = "t")]
    pub request_code: String,
    /// `#`-joined instrument key list.
    #[serde(rename = "k")]
    pub keys: String,
}

impl SubscriptionRequest {
    /// Build a subscribe frame for a data class.
    #[must_use]
    pub fn subscribe(class: DataClass, keys: &[InstrumentKey]) -> Self {
        Self {
            request_code: subscribe_code(class).to_string(),
            keys: join_keys(keys),
        }
    }

    /// Build an unsubscribe frame for a data class.
    #[must_use]
    pub fn unsubscribe(class: DataClass, keys: &[InstrumentKey]) -> Self {
        Self {
            request_code: unsubscribe_code(class).to_string(),
            keys: join_keys(keys),
        }
    }

    /// Serialize to the JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Codec`] if serialization fails.
    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// Keep-Alive
// =============================================================================

/// The periodic liveness frame.
///
/// The platform drops streams that stay silent; this frame is the
/// protocol's idle-timeout prevention and expects no reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeartbeatFrame {
    /// Request code, always `"h"`.
    #[serde(rename = "t")]
    pub request_code: String,
    /// Always empty for a heartbeat.
    #[serde(rename = "k")]
    pub keys: String,
}

impl HeartbeatFrame {
    /// Build the liveness frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_code: CODE_KEEP_ALIVE.to_string(),
            keys: String::new(),
        }
    }

    /// Serialize to the JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Codec`] if serialization fails.
    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for HeartbeatFrame {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
