//! Streaming Session
//!
//! The platform-facing session object. It provisions the remote streaming
//! slot over REST, opens and hands off the WebSocket connection, tracks
//! subscription intent, and delivers inbound traffic to the caller as an
//! ordered stream.
//!
//! # Design
//!
//! One session owns at most one live connection. Lifecycle state sits in
//! a synchronous lock that is never held across an await; the connection
//! handle sits in an async mutex so connect, sends, and teardown
//! serialize cleanly. The read half runs in a spawned task feeding the
//! dispatcher; the write half is shared between callers and the
//! keep-alive ticker behind one async mutex, so outbound frames never
//! interleave. Registry updates happen while the write guard is held,
//! which orders every successful subscription commit before the clear
//! performed by `close`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::domain::instrument::{DataClass, InstrumentKey};
use crate::domain::subscription::{RegistryStats, SubscriptionRegistry};
use crate::infrastructure::config::StreamSettings;

use super::control::{SessionControlClient, SessionControlError};
use super::dispatcher::{self, DisconnectReason, InboundDispatcher, InboundMessage, MessageStream};
use super::frames::{ConnectAck, ConnectRequest, FrameError, SubscriptionRequest};
use super::keepalive::{KeepAliveConfig, KeepAliveHandle, KeepAliveTicker};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by [`StreamingSession`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The platform rejected the session token.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Connection-level I/O failure, covering sends and handshakes.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed or unexpected handshake or frame.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A remote streaming session already exists for this user.
    #[error("remote session already exists")]
    Conflict,

    /// The operation needs a live connection and none exists.
    #[error("not connected")]
    NotConnected,

    /// A live connection already exists.
    #[error("already connected")]
    AlreadyConnected,
}

impl From<SessionControlError> for SessionError {
    fn from(err: SessionControlError) -> Self {
        match err {
            SessionControlError::Unauthorized => {
                Self::Auth("session control rejected the token".to_string())
            }
            SessionControlError::Conflict => Self::Conflict,
            SessionControlError::Network(detail) => Self::Transport(detail),
            SessionControlError::UnexpectedResponse(detail) => Self::Protocol(detail),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        Self::Protocol(err.to_string())
    }
}

// =============================================================================
// Lifecycle State
// =============================================================================

/// Lifecycle states of a [`StreamingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No remote streaming slot is provisioned.
    Uninitialized,
    /// The remote slot is provisioned and a connection may be opened.
    RemoteReady,
    /// A live connection exists.
    Connected,
    /// The session was torn down locally.
    Closed,
}

impl SessionState {
    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::RemoteReady => "remote_ready",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Session Events
// =============================================================================

/// Out-of-band lifecycle notifications.
///
/// Background-task outcomes arrive here instead of being mixed into the
/// inbound message sequence. Delivery is best-effort: a full or closed
/// channel drops the event rather than blocking a background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The handshake completed and the stream is live.
    Connected,
    /// The inbound stream ended.
    Disconnected {
        /// Why the stream ended.
        reason: DisconnectReason,
    },
    /// A keep-alive frame could not be sent.
    KeepAliveFailed {
        /// Transport error detail.
        error: String,
    },
}

pub(crate) fn emit(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = events.try_send(event) {
        tracing::debug!(error = %e, "session event dropped");
    }
}

// =============================================================================
// Streaming Session
// =============================================================================

/// Live connection internals, owned exclusively by the session.
struct ConnectionHandle {
    writer: Arc<Mutex<WsSink>>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    keep_alive: Option<KeepAliveHandle>,
}

/// Persistent streaming session for one authenticated user.
///
/// The session composes the REST control client, the WebSocket
/// connection, the subscription registry, and the keep-alive ticker.
/// All methods take `&self`; the session is shared behind an `Arc` by
/// callers that subscribe and consume from different tasks.
pub struct StreamingSession {
    settings: StreamSettings,
    user_id: String,
    session_token: String,
    control: SessionControlClient,
    registry: SubscriptionRegistry,
    state: RwLock<SessionState>,
    connection: Mutex<Option<ConnectionHandle>>,
    events: mpsc::Sender<SessionEvent>,
}

impl fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSession")
            .field("user_id", &self.user_id)
            .field("session_token", &"<redacted>")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl StreamingSession {
    /// Create a session bound to one user and session token.
    ///
    /// The token is an immutable credential for the session's lifetime;
    /// no token refresh happens here. Construction performs no network
    /// traffic, provisioning and connecting are explicit calls.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] if the HTTP client for
    /// session control cannot be constructed.
    pub fn new(
        settings: StreamSettings,
        user_id: &str,
        session_token: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let control = SessionControlClient::new(
            &settings.api_base_url,
            user_id,
            session_token,
            settings.request_timeout,
        )?;

        Ok(Self {
            settings,
            user_id: user_id.to_string(),
            session_token: session_token.to_string(),
            control,
            registry: SubscriptionRegistry::new(),
            state: RwLock::new(SessionState::Uninitialized),
            connection: Mutex::new(None),
            events,
        })
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Subscription counts per data class.
    #[must_use]
    pub fn subscription_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Keys currently registered for a data class.
    #[must_use]
    pub fn subscriptions(&self, class: DataClass) -> HashSet<InstrumentKey> {
        self.registry.snapshot(class)
    }

    // =========================================================================
    // Remote Session Control
    // =========================================================================

    /// Drop any existing remote streaming slot for this user.
    ///
    /// Idempotent: succeeding with no remote session to drop is normal.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyConnected`] while a live connection
    /// exists, [`SessionError::Auth`] when the token is rejected, and
    /// [`SessionError::Transport`] on network failure.
    pub async fn invalidate_remote_session(&self) -> Result<(), SessionError> {
        if self.state() == SessionState::Connected {
            return Err(SessionError::AlreadyConnected);
        }

        self.control.invalidate_session().await?;
        *self.state.write() = SessionState::Uninitialized;
        tracing::info!(user_id = %self.user_id, "remote streaming session invalidated");
        Ok(())
    }

    /// Provision a new remote streaming slot bound to the session token.
    ///
    /// Must precede [`connect`](Self::connect); the platform refuses the
    /// handshake without a provisioned slot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyConnected`] while a live connection
    /// exists, [`SessionError::Conflict`] when a remote session already
    /// exists, [`SessionError::Auth`] when the token is rejected, and
    /// [`SessionError::Transport`] on network failure.
    pub async fn create_remote_session(&self) -> Result<(), SessionError> {
        if self.state() == SessionState::Connected {
            return Err(SessionError::AlreadyConnected);
        }

        self.control.create_session().await?;
        *self.state.write() = SessionState::RemoteReady;
        tracing::info!(user_id = %self.user_id, "remote streaming session created");
        Ok(())
    }

    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    /// Open the WebSocket connection and complete the protocol handshake.
    ///
    /// On success the returned stream yields inbound messages in arrival
    /// order until [`close`](Self::close) runs or the transport fails.
    /// A session can be connected again after a close; each connect
    /// yields a fresh stream.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyConnected`] if a live connection
    /// exists, [`SessionError::Transport`] when the endpoint is
    /// unreachable or the socket fails mid-handshake, and
    /// [`SessionError::Protocol`] when the handshake is rejected or the
    /// reply is not a handshake acknowledgement.
    pub async fn connect(&self) -> Result<MessageStream, SessionError> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Err(SessionError::AlreadyConnected);
        }

        tracing::info!(url = %self.settings.ws_url, "connecting streaming session");
        let (socket, _response) = connect_async(&self.settings.ws_url).await?;
        let (mut write, mut read) = socket.split();

        let request = ConnectRequest::new(&self.user_id, &self.session_token);
        write.send(Message::Text(request.to_json()?.into())).await?;

        let ack = await_connect_ack(&mut read, self.settings.handshake_timeout).await?;
        if !ack.accepted() {
            return Err(SessionError::Protocol(format!(
                "handshake rejected with status \"{}\"",
                ack.status
            )));
        }

        let writer = Arc::new(Mutex::new(write));
        let cancel = CancellationToken::new();
        let (dispatcher, stream) = dispatcher::channel();

        let reader = tokio::spawn(read_loop(
            read,
            Arc::clone(&writer),
            dispatcher,
            cancel.clone(),
            self.events.clone(),
        ));

        *connection = Some(ConnectionHandle {
            writer,
            cancel,
            reader,
            keep_alive: None,
        });
        *self.state.write() = SessionState::Connected;
        emit(&self.events, SessionEvent::Connected);
        tracing::info!(user_id = %self.user_id, "streaming session connected");

        Ok(stream)
    }

    /// Tear down the connection and end the session.
    ///
    /// Ordered teardown: the keep-alive ticker stops first, then the
    /// reader loop stops and the inbound sequence ends (messages already
    /// buffered are still delivered), then the socket closes, and finally
    /// the registry clears. Failures along the way are logged and the
    /// remaining steps still run. Calling close with no live connection
    /// is a no-op, so repeated closes are safe.
    ///
    /// After close returns, no background task is running and no further
    /// frame will be sent.
    pub async fn close(&self) {
        let mut connection = self.connection.lock().await;
        let Some(handle) = connection.take() else {
            tracing::debug!("close without a live connection is a no-op");
            return;
        };

        if let Some(keep_alive) = handle.keep_alive {
            keep_alive.stop().await;
        }

        handle.cancel.cancel();
        if let Err(e) = handle.reader.await {
            tracing::debug!(error = %e, "reader task join failed");
        }

        let mut sink = handle.writer.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "close frame send failed");
        }
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "socket close failed");
        }
        drop(sink);

        self.registry.clear();
        *self.state.write() = SessionState::Closed;
        tracing::info!(user_id = %self.user_id, "streaming session closed");
    }

    // =========================================================================
    // Keep-Alive
    // =========================================================================

    /// Start periodic keep-alive emission over the live connection.
    ///
    /// Returns without blocking on the schedule; the ticker runs as a
    /// background task. Starting while a ticker is already running is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] without a live connection.
    pub async fn start_keep_alive(&self, config: KeepAliveConfig) -> Result<(), SessionError> {
        let mut connection = self.connection.lock().await;
        let Some(handle) = connection.as_mut() else {
            return Err(SessionError::NotConnected);
        };

        if let Some(keep_alive) = &handle.keep_alive
            && !keep_alive.is_finished()
        {
            tracing::debug!("keep-alive already running");
            return Ok(());
        }

        let ticker = KeepAliveTicker::new(
            config,
            Arc::clone(&handle.writer),
            self.events.clone(),
            handle.cancel.child_token(),
        );
        handle.keep_alive = Some(ticker.spawn());
        tracing::info!(
            interval_ms = config.interval.as_millis(),
            immediate = config.immediate,
            "keep-alive started"
        );
        Ok(())
    }

    /// Stop keep-alive emission and wait for the ticker to exit.
    ///
    /// Idempotent: succeeds silently when no ticker is running or no
    /// connection exists. After this returns no further liveness frame
    /// will be sent.
    pub async fn stop_keep_alive(&self) {
        let ticker = {
            let mut connection = self.connection.lock().await;
            connection
                .as_mut()
                .and_then(|handle| handle.keep_alive.take())
        };

        if let Some(ticker) = ticker {
            ticker.stop().await;
            tracing::info!("keep-alive stopped");
        }
    }

    /// Whether a keep-alive ticker is currently running.
    pub async fn keep_alive_running(&self) -> bool {
        let connection = self.connection.lock().await;
        connection
            .as_ref()
            .and_then(|handle| handle.keep_alive.as_ref())
            .is_some_and(|keep_alive| !keep_alive.is_finished())
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register interest in instruments and announce it on the wire.
    ///
    /// All keys travel in one control frame. The registry records intent,
    /// not confirmed server state (the protocol has no subscribe ack),
    /// and is updated only after the frame is handed to the transport, so
    /// a failed send leaves it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Protocol`] for an empty key list,
    /// [`SessionError::NotConnected`] without a live connection, and
    /// [`SessionError::Transport`] when the send fails.
    pub async fn subscribe(
        &self,
        class: DataClass,
        keys: &[InstrumentKey],
    ) -> Result<(), SessionError> {
        let json = Self::encode_subscription(SubscriptionRequest::subscribe(class, keys), keys)?;
        let writer = self.current_writer().await?;

        let mut sink = writer.lock().await;
        sink.send(Message::Text(json.into())).await?;
        // Commit under the write guard so close() cannot clear between
        // the send and the registry update.
        self.registry.add(class, keys);
        drop(sink);

        tracing::debug!(class = %class, count = keys.len(), "subscribed");
        Ok(())
    }

    /// Withdraw interest in instruments and announce it on the wire.
    ///
    /// The frame is sent even for keys that were never registered;
    /// removing them from the registry is then a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Protocol`] for an empty key list,
    /// [`SessionError::NotConnected`] without a live connection, and
    /// [`SessionError::Transport`] when the send fails.
    pub async fn unsubscribe(
        &self,
        class: DataClass,
        keys: &[InstrumentKey],
    ) -> Result<(), SessionError> {
        let json = Self::encode_subscription(SubscriptionRequest::unsubscribe(class, keys), keys)?;
        let writer = self.current_writer().await?;

        let mut sink = writer.lock().await;
        sink.send(Message::Text(json.into())).await?;
        self.registry.remove(class, keys);
        drop(sink);

        tracing::debug!(class = %class, count = keys.len(), "unsubscribed");
        Ok(())
    }

    /// Validate and encode one subscription control frame.
    fn encode_subscription(
        frame: SubscriptionRequest,
        keys: &[InstrumentKey],
    ) -> Result<String, SessionError> {
        if keys.is_empty() {
            return Err(SessionError::Protocol(
                "subscription change requires at least one instrument key".to_string(),
            ));
        }
        Ok(frame.to_json()?)
    }

    /// Writer handle of the live connection, if any.
    async fn current_writer(&self) -> Result<Arc<Mutex<WsSink>>, SessionError> {
        let connection = self.connection.lock().await;
        connection
            .as_ref()
            .map(|handle| Arc::clone(&handle.writer))
            .ok_or(SessionError::NotConnected)
    }
}

// =============================================================================
// Connection Tasks
// =============================================================================

/// Wait for the handshake acknowledgement, skipping transport-level
/// control frames that may arrive first.
async fn await_connect_ack(
    read: &mut WsSource,
    timeout: Duration,
) -> Result<ConnectAck, SessionError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let frame = tokio::time::timeout_at(deadline, read.next())
            .await
            .map_err(|_| SessionError::Transport("handshake timed out".to_string()))?;

        match frame {
            Some(Ok(Message::Text(text))) => return Ok(ConnectAck::from_json(text.as_str())?),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) => {
                return Err(SessionError::Transport(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(other)) => {
                return Err(SessionError::Protocol(format!(
                    "unexpected handshake frame: {other:?}"
                )));
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(SessionError::Transport(
                    "connection closed during handshake".to_string(),
                ));
            }
        }
    }
}

/// Pump inbound frames into the dispatcher until the connection ends,
/// then close the dispatcher with the reason and report it.
async fn read_loop(
    mut read: WsSource,
    writer: Arc<Mutex<WsSink>>,
    dispatcher: InboundDispatcher,
    cancel: CancellationToken,
    events: mpsc::Sender<SessionEvent>,
) {
    let reason = loop {
        tokio::select! {
            () = cancel.cancelled() => break DisconnectReason::Requested,
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !dispatcher.dispatch(InboundMessage::text(text.as_str())) {
                        tracing::debug!("inbound consumer dropped, message discarded");
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    if !dispatcher.dispatch(InboundMessage::binary(bytes.into())) {
                        tracing::debug!("inbound consumer dropped, message discarded");
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let mut sink = writer.lock().await;
                    if let Err(e) = sink.send(Message::Pong(payload)).await {
                        tracing::debug!(error = %e, "pong reply failed");
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "server closed the stream");
                    break DisconnectReason::Server;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "inbound read failed");
                    break DisconnectReason::Transport(e.to_string());
                }
                None => {
                    tracing::info!("inbound stream ended");
                    break DisconnectReason::Server;
                }
            }
        }
    };

    // Idempotent; on a non-requested exit this also stops the keep-alive
    // ticker, whose token is a child of the connection token.
    cancel.cancel();
    dispatcher.close(reason.clone());
    emit(&events, SessionEvent::Disconnected { reason });
}

// =============================================================================
// Tests
// =============================================================================
