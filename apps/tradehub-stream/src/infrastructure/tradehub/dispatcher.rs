//! Inbound Message Dispatch
//!
//! Decouples the connection's read loop from the consumer: the reader
//! pushes every feed frame into a queue and moves straight back to the
//! socket, so a slow consumer never stalls the read path.
//!
//! # Backpressure
//!
//! The queue is unbounded. The read loop never blocks behind the consumer
//! and never drops a frame; the cost is unbounded memory if the consumer
//! stalls while the feed keeps producing. Callers own that trade-off and
//! should keep the consumer task dedicated to draining.
//!
//! # Termination
//!
//! The producer half closes the queue exactly once, recording why
//! ([`DisconnectReason`]). Messages queued before the close are still
//! delivered; afterwards the consumer sees end-of-sequence and can read
//! the terminal cause from the side channel instead of the message
//! stream.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;

// =============================================================================
// Disconnect Reason
// =============================================================================

/// Why the inbound sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Torn down locally by `close()`.
    Requested,
    /// The server ended the stream with a close frame or clean EOF.
    Server,
    /// The transport failed mid-read.
    Transport(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("closed by caller"),
            Self::Server => f.write_str("closed by server"),
            Self::Transport(detail) => write!(f, "transport failure: {detail}"),
        }
    }
}

// =============================================================================
// Inbound Message
// =============================================================================

/// Payload forms the stream can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

/// A raw frame off the stream plus its receipt time.
///
/// The payload is opaque: feed frames are handed to the consumer exactly
/// as read, with no interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Frame payload exactly as read off the wire.
    pub payload: MessagePayload,
    /// When the read loop took the frame off the wire.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Wrap a text frame, stamping the receipt time.
    #[must_use]
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: MessagePayload::Text(payload.into()),
            received_at: Utc::now(),
        }
    }

    /// Wrap a binary frame, stamping the receipt time.
    #[must_use]
    pub fn binary(payload: Vec<u8>) -> Self {
        Self {
            payload: MessagePayload::Binary(payload),
            received_at: Utc::now(),
        }
    }

    /// The payload as text, if it was a text frame.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::Text(text) => Some(text),
            MessagePayload::Binary(_) => None,
        }
    }
}

// =============================================================================
// Dispatcher Pair
// =============================================================================

/// Producer half, owned by the connection's read loop.
#[derive(Debug)]
pub struct InboundDispatcher {
    tx: mpsc::UnboundedSender<InboundMessage>,
    reason: Arc<RwLock<Option<DisconnectReason>>>,
}

/// Consumer half, returned from `connect()`.
///
/// Exactly one task should drain this handle; receiving takes `&mut self`
/// so concurrent consumption does not compile.
#[derive(Debug)]
pub struct MessageStream {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
    reason: Arc<RwLock<Option<DisconnectReason>>>,
}

/// Create a connected dispatcher/stream pair.
#[must_use]
pub fn channel() -> (InboundDispatcher, MessageStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let reason = Arc::new(RwLock::new(None));
    (
        InboundDispatcher {
            tx,
            reason: Arc::clone(&reason),
        },
        MessageStream { rx, reason },
    )
}

impl InboundDispatcher {
    /// Queue one message for the consumer.
    ///
    /// Returns `false` if the consumer dropped its handle; the read loop
    /// keeps the connection alive regardless, since subscriptions and
    /// keep-alive are independent of feed consumption.
    pub fn dispatch(&self, message: InboundMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Record the terminal cause and end the sequence.
    ///
    /// Consuming the dispatcher drops the sender, so the consumer sees
    /// end-of-sequence once the queue is drained. The first recorded
    /// reason wins; the reason is visible to the consumer before the
    /// sequence ends.
    pub fn close(self, reason: DisconnectReason) {
        let mut slot = self.reason.write();
        if slot.is_none() {
            *slot = Some(reason);
        }
    }
}

impl MessageStream {
    /// Receive the next message; `None` once the producer closed the
    /// sequence and the queue is drained.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for drain loops after close.
    ///
    /// # Errors
    ///
    /// Returns the channel's try-receive error when the queue is empty or
    /// the sequence has ended.
    pub fn try_recv(&mut self) -> Result<InboundMessage, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Terminal cause, populated once the producer closes the sequence.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.reason.read().clone()
    }
}

impl futures_util::Stream for MessageStream {
    type Item = InboundMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// =============================================================================
// Tests
// =============================================================================
