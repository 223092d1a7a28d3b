//! Keep-Alive Ticker
//!
//! Sends the protocol's liveness frame on a fixed period, independent of
//! application traffic, so intermediaries and the platform's idle timeout
//! never see a silent stream.
//!
//! # Design
//!
//! The ticker is a cancellable scheduled task: a `tokio` interval looped
//! under a `CancellationToken`, not a flag polled in a busy loop. It
//! shares the connection's write half behind the session's mutex, so its
//! frames serialize with subscription traffic instead of interleaving.
//! A failed send is reported on the session's event channel and the
//! schedule continues; stopping the ticker is the owner's decision.

use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::frames::HeartbeatFrame;
use super::stream::{SessionEvent, emit};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for keep-alive emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Period between liveness frames.
    pub interval: Duration,
    /// Send one frame immediately instead of waiting a full period first.
    pub immediate: bool,
}

// =============================================================================
// Ticker
// =============================================================================

/// Periodic sender of liveness frames over a shared write half.
pub struct KeepAliveTicker<S> {
    config: KeepAliveConfig,
    writer: Arc<Mutex<S>>,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl<S> KeepAliveTicker<S>
where
    S: SinkExt<Message> + Unpin + Send + 'static,
    S::Error: std::fmt::Display,
{
    /// Create a ticker over a shared write half.
    ///
    /// The cancellation token is typically a child of the connection's
    /// token, so connection teardown implies ticker teardown.
    pub const fn new(
        config: KeepAliveConfig,
        writer: Arc<Mutex<S>>,
        events: mpsc::Sender<SessionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            writer,
            events,
            cancel,
        }
    }

    /// Spawn the ticker onto the runtime, returning its handle.
    #[must_use]
    pub fn spawn(self) -> KeepAliveHandle {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run());
        KeepAliveHandle { cancel, task }
    }

    /// Run until cancelled. One send attempt per tick; failures are
    /// reported and the schedule continues.
    async fn run(self) {
        // A zero period would panic the timer.
        let period = self.config.interval.max(Duration::from_millis(1));
        let first_tick = if self.config.immediate {
            time::Instant::now()
        } else {
            time::Instant::now() + period
        };
        let mut interval = time::interval_at(first_tick, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(
            interval_ms = period.as_millis(),
            immediate = self.config.immediate,
            "keep-alive ticker started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("keep-alive ticker cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.send_heartbeat().await;
                }
            }
        }
    }

    async fn send_heartbeat(&self) {
        let json = match HeartbeatFrame::new().to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "heartbeat frame failed to encode");
                return;
            }
        };

        let mut writer = self.writer.lock().await;
        match writer.send(Message::Text(json.into())).await {
            Ok(()) => tracing::trace!("keep-alive frame sent"),
            Err(e) => {
                tracing::warn!(error = %e, "keep-alive send failed");
                emit(
                    &self.events,
                    SessionEvent::KeepAliveFailed {
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Running ticker handle held by the session.
#[derive(Debug)]
pub struct KeepAliveHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl KeepAliveHandle {
    /// Cancel the ticker and wait for it to finish.
    ///
    /// After this returns no further liveness frame will be sent; an
    /// in-flight send completes before the task exits.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::debug!(error = %e, "keep-alive task join failed");
        }
    }

    /// Whether the ticker task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

// =============================================================================
// Tests
// =============================================================================
