//! TradeHub Streaming Adapters
//!
//! Implements the client side of the TradeHub streaming platform:
//!
//! - **Session control**: REST provisioning of the remote streaming slot
//! - **Frames**: JSON control-frame codec for the streaming protocol
//! - **Streaming session**: connection lifecycle, subscriptions, teardown
//! - **Dispatcher**: ordered hand-off of inbound traffic to the consumer
//! - **Keep-alive**: periodic liveness frames on a cancellable schedule

pub mod control;
pub mod dispatcher;
pub mod frames;
pub mod keepalive;
pub mod stream;

pub use control::{SessionControlClient, SessionControlError};
pub use dispatcher::{DisconnectReason, InboundMessage, MessagePayload, MessageStream};
pub use frames::{ConnectAck, ConnectRequest, FrameError, HeartbeatFrame, SubscriptionRequest};
pub use keepalive::{KeepAliveConfig, KeepAliveHandle, KeepAliveTicker};
pub use stream::{SessionError, SessionEvent, SessionState, StreamingSession};
