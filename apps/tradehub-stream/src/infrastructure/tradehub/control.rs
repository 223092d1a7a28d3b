//! Remote Session Control
//!
//! HTTP client for the platform's streaming-session endpoints. The
//! platform accepts a stream handshake only for a provisioned remote
//! session, so a caller invalidates any stale session and creates a fresh
//! one before connecting.
//!
//! # Endpoints
//!
//! ```text
//! POST {api_base}/ws/invalidateSocketSess
//! POST {api_base}/ws/createSocketSess
//! ```
//!
//! Both take the body `{"loginType":"API"}` and the header
//! `Authorization: Bearer {userId} {sessionToken}`, and reply with
//! `{"stat":"Ok"}` on success. Create reports an un-invalidated existing
//! session either as HTTP 409 or as a `stat != "Ok"` body; invalidate
//! treats any 2xx reply as success since "nothing to drop" satisfies the
//! intent.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const INVALIDATE_SESSION_PATH: &str = "ws/invalidateSocketSess";
const CREATE_SESSION_PATH: &str = "ws/createSocketSess";

const STAT_OK: &str = "Ok";
const LOGIN_TYPE: &str = "API";

// =============================================================================
// Errors
// =============================================================================

/// Errors from session-control round trips.
#[derive(Debug, Error)]
pub enum SessionControlError {
    /// The platform rejected the session token.
    #[error("session token rejected by session control")]
    Unauthorized,
    /// A remote streaming session already exists for this user.
    #[error("remote streaming session already exists")]
    Conflict,
    /// The request never completed (connect, TLS, or timeout failure).
    #[error("session-control request failed: {0}")]
    Network(String),
    /// The platform replied with something this client cannot interpret.
    #[error("unexpected session-control response: {0}")]
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for SessionControlError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SessionControlRequest {
    #[serde(rename = "loginType")]
    login_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct SessionControlResponse {
    #[serde(default)]
    stat: String,
    #[serde(default)]
    emsg: Option<String>,
}

impl SessionControlResponse {
    fn ok(&self) -> bool {
        self.stat == STAT_OK
    }

    fn describe(&self) -> String {
        match &self.emsg {
            Some(emsg) => format!("stat={} emsg={emsg}", self.stat),
            None => format!("stat={}", self.stat),
        }
    }
}

// =============================================================================
// Session Control Client
// =============================================================================

/// HTTP client for the invalidate/create session endpoints.
#[derive(Debug)]
pub struct SessionControlClient {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    session_token: String,
}

impl SessionControlClient {
    /// Create a client bound to one user and session token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionControlError::Network`] if the underlying HTTP
    /// client cannot be constructed.
    pub fn new(
        base_url: &str,
        user_id: &str,
        session_token: &str,
        timeout: Duration,
    ) -> Result<Self, SessionControlError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionControlError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            session_token: session_token.to_string(),
        })
    }

    /// Drop any existing remote streaming session for this user.
    ///
    /// Idempotent: succeeds when there is no session to drop.
    ///
    /// # Errors
    ///
    /// Returns [`SessionControlError::Unauthorized`] for a rejected token
    /// and [`SessionControlError::Network`] for transport failures.
    pub async fn invalidate_session(&self) -> Result<(), SessionControlError> {
        let response = self.post_control(INVALIDATE_SESSION_PATH).await?;
        if !response.ok() {
            // The platform reports "no session to invalidate" as a non-Ok
            // stat; the drop intent is satisfied either way.
            tracing::debug!(detail = %response.describe(), "invalidate reported no-op");
        }
        tracing::info!(user_id = %self.user_id, "remote streaming session invalidated");
        Ok(())
    }

    /// Provision a new remote streaming session bound to the token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionControlError::Conflict`] when a session already
    /// exists, [`SessionControlError::Unauthorized`] for a rejected token,
    /// and [`SessionControlError::Network`] for transport failures.
    pub async fn create_session(&self) -> Result<(), SessionControlError> {
        let response = self.post_control(CREATE_SESSION_PATH).await?;
        if !response.ok() {
            // Create has exactly one platform-level failure: the session
            // was not invalidated first. Everything else arrives as an
            // HTTP error status.
            tracing::warn!(detail = %response.describe(), "create session refused");
            return Err(SessionControlError::Conflict);
        }
        tracing::info!(user_id = %self.user_id, "remote streaming session created");
        Ok(())
    }

    async fn post_control(
        &self,
        path: &str,
    ) -> Result<SessionControlResponse, SessionControlError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {} {}", self.user_id, self.session_token),
            )
            .json(&SessionControlRequest {
                login_type: LOGIN_TYPE,
            })
            .send()
            .await?;

        let status = response.status();
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(SessionControlError::Unauthorized)
            }
            reqwest::StatusCode::CONFLICT => Err(SessionControlError::Conflict),
            status if status.is_success() => {
                let text = response.text().await?;
                serde_json::from_str(&text).map_err(|_| {
                    SessionControlError::UnexpectedResponse(format!(
                        "unparseable body from {path}: {text}"
                    ))
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SessionControlError::UnexpectedResponse(format!(
                    "{path} returned {status}: {body}"
                )))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
