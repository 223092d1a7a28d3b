//! Session Control Integration Tests
//!
//! Exercises remote session provisioning against an in-process HTTP
//! server: the invalidate/create sequence, conflict and auth failures,
//! and the request shape the platform expects.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use futures_util::SinkExt;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use tradehub_stream::{SessionError, SessionEvent, SessionState, StreamSettings, StreamingSession};

// =============================================================================
// Mock Control Server
// =============================================================================

/// How a control endpoint answers.
#[derive(Debug, Clone, Copy)]
enum ResponseScript {
    Accept,
    SessionAbsent,
    ConflictStatus,
    ConflictBody,
    Unauthorized,
    ServerError,
}

impl ResponseScript {
    fn respond(self) -> (StatusCode, String) {
        match self {
            Self::Accept => (StatusCode::OK, r#"{"stat":"Ok"}"#.to_string()),
            Self::SessionAbsent => (
                StatusCode::OK,
                r#"{"stat":"Not_Ok","emsg":"Session not found"}"#.to_string(),
            ),
            Self::ConflictStatus => (
                StatusCode::CONFLICT,
                r#"{"stat":"Not_Ok","emsg":"Session already exists"}"#.to_string(),
            ),
            Self::ConflictBody => (
                StatusCode::OK,
                r#"{"stat":"Not_Ok","emsg":"Session already exists"}"#.to_string(),
            ),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
            Self::ServerError => (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
        }
    }
}

#[derive(Debug)]
struct CapturedRequest {
    path: &'static str,
    authorization: Option<String>,
    body: String,
}

#[derive(Clone)]
struct ControlState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    invalidate: ResponseScript,
    create: ResponseScript,
}

struct ControlServer {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn invalidate_handler(
    State(state): State<ControlState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    capture(&state, "ws/invalidateSocketSess", &headers, body);
    state.invalidate.respond()
}

async fn create_handler(
    State(state): State<ControlState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    capture(&state, "ws/createSocketSess", &headers, body);
    state.create.respond()
}

fn capture(state: &ControlState, path: &'static str, headers: &HeaderMap, body: String) {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    state.requests.lock().push(CapturedRequest {
        path,
        authorization,
        body,
    });
}

async fn spawn_control_server(invalidate: ResponseScript, create: ResponseScript) -> ControlServer {
    let state = ControlState {
        requests: Arc::new(Mutex::new(Vec::new())),
        invalidate,
        create,
    };
    let requests = Arc::clone(&state.requests);

    let app = Router::new()
        .route("/ws/invalidateSocketSess", post(invalidate_handler))
        .route("/ws/createSocketSess", post(create_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ControlServer {
        base_url: format!("http://{addr}"),
        requests,
    }
}

/// Accept streaming connections and approve every handshake.
async fn spawn_ws_acceptor() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let mut ws = accept_async(socket).await.unwrap();
            if let Some(Ok(_)) = ws.next().await {
                let _ = ws.send(Message::Text(r#"{"t":"ck","s":"OK"}"#.into())).await;
            }
            while ws.next().await.is_some() {}
        }
    });
    addr
}

// =============================================================================
// Test Helpers
// =============================================================================

fn control_settings(api_base_url: String, ws_addr: Option<SocketAddr>) -> StreamSettings {
    StreamSettings {
        api_base_url,
        ws_url: ws_addr.map_or_else(
            || "ws://127.0.0.1:9".to_string(),
            |addr| format!("ws://{addr}"),
        ),
        request_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        keep_alive_interval: Duration::from_secs(10),
    }
}

fn session_against(settings: StreamSettings) -> (StreamingSession, mpsc::Receiver<SessionEvent>) {
    let (events_tx, events_rx) = mpsc::channel(16);
    let session = StreamingSession::new(settings, "TH10250", "test-token", events_tx).unwrap();
    (session, events_rx)
}

// =============================================================================
// Provisioning Sequence Tests
// =============================================================================

#[tokio::test]
async fn test_invalidate_create_connect_sequence() {
    let server = spawn_control_server(ResponseScript::Accept, ResponseScript::Accept).await;
    let ws_addr = spawn_ws_acceptor().await;
    let (session, _events) = session_against(control_settings(server.base_url.clone(), Some(ws_addr)));

    session.invalidate_remote_session().await.unwrap();
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.create_remote_session().await.unwrap();
    assert_eq!(session.state(), SessionState::RemoteReady);

    let _stream = session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    let second = session.connect().await;
    assert!(matches!(second, Err(SessionError::AlreadyConnected)));

    let requests = server.requests.lock();
    let paths: Vec<&str> = requests.iter().map(|request| request.path).collect();
    assert_eq!(paths, vec!["ws/invalidateSocketSess", "ws/createSocketSess"]);
    drop(requests);

    session.close().await;
}

#[tokio::test]
async fn test_invalidate_with_no_remote_session_succeeds() {
    let server = spawn_control_server(ResponseScript::SessionAbsent, ResponseScript::Accept).await;
    let (session, _events) = session_against(control_settings(server.base_url.clone(), None));

    session.invalidate_remote_session().await.unwrap();

    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_create_conflict_status_is_conflict_error() {
    let server = spawn_control_server(ResponseScript::Accept, ResponseScript::ConflictStatus).await;
    let (session, _events) = session_against(control_settings(server.base_url.clone(), None));

    let result = session.create_remote_session().await;

    assert!(matches!(result, Err(SessionError::Conflict)));
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_create_refused_body_is_conflict_error() {
    let server = spawn_control_server(ResponseScript::Accept, ResponseScript::ConflictBody).await;
    let (session, _events) = session_against(control_settings(server.base_url.clone(), None));

    let result = session.create_remote_session().await;

    assert!(matches!(result, Err(SessionError::Conflict)));
}

// =============================================================================
// Failure Mapping Tests
// =============================================================================

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let server =
        spawn_control_server(ResponseScript::Unauthorized, ResponseScript::Unauthorized).await;
    let (session, _events) = session_against(control_settings(server.base_url.clone(), None));

    let invalidate = session.invalidate_remote_session().await;
    assert!(matches!(invalidate, Err(SessionError::Auth(_))));

    let create = session.create_remote_session().await;
    assert!(matches!(create, Err(SessionError::Auth(_))));
}

#[tokio::test]
async fn test_unexpected_status_is_protocol_error() {
    let server = spawn_control_server(ResponseScript::ServerError, ResponseScript::Accept).await;
    let (session, _events) = session_against(control_settings(server.base_url.clone(), None));

    let result = session.invalidate_remote_session().await;

    assert!(matches!(result, Err(SessionError::Protocol(_))));
}

#[tokio::test]
async fn test_unreachable_control_endpoint_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (session, _events) = session_against(control_settings(format!("http://{addr}"), None));

    let result = session.create_remote_session().await;

    assert!(matches!(result, Err(SessionError::Transport(_))));
}

// =============================================================================
// Request Shape Tests
// =============================================================================

#[tokio::test]
async fn test_control_requests_carry_bearer_identity_and_login_type() {
    let server = spawn_control_server(ResponseScript::Accept, ResponseScript::Accept).await;
    let (session, _events) = session_against(control_settings(server.base_url.clone(), None));

    session.invalidate_remote_session().await.unwrap();

    let requests = server.requests.lock();
    let request = requests.first().unwrap();
    assert_eq!(
        request.authorization.as_deref(),
        Some("Bearer TH10250 test-token")
    );
    assert_eq!(request.body, r#"{"loginType":"API"}"#);
}
