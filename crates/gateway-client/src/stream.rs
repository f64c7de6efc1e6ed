//! Event stream
//!
//! Bounded single-producer, single-consumer queue between the session and
//! its consumer. A full buffer suspends the producer instead of dropping.

use crate::events::DispatchEvent;
use crate::session::SessionError;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Why the stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The session was closed by its owner
    Closed,
    /// The session stopped on an unrecoverable error
    Fatal(SessionError),
}

impl CloseReason {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Fatal(err) => Some(err),
            Self::Closed => None,
        }
    }
}

/// The consumer dropped its end of the stream
#[derive(Debug, thiserror::Error)]
#[error("Event stream consumer is gone")]
pub struct ConsumerGone;

/// Create a bounded event stream
#[must_use]
pub fn event_channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let reason = Arc::new(Mutex::new(None));

    (
        EventSink {
            tx,
            reason: Arc::clone(&reason),
        },
        EventStream { rx, reason },
    )
}

/// Producer half, owned by the session driver
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<DispatchEvent>,
    reason: Arc<Mutex<Option<CloseReason>>>,
}

impl EventSink {
    /// Push an event, waiting while the buffer is full
    pub async fn push(&self, event: DispatchEvent) -> Result<(), ConsumerGone> {
        self.tx.send(event).await.map_err(|_| ConsumerGone)
    }

    /// End the stream; buffered events are still delivered first
    pub fn close(self, reason: CloseReason) {
        *self.reason.lock() = Some(reason);
    }

    /// Check if the consumer dropped the stream
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half: the session's ordered events
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<DispatchEvent>,
    reason: Arc<Mutex<Option<CloseReason>>>,
}

impl EventStream {
    /// Next event; `None` once the session has ended and the buffer is drained
    pub async fn recv(&mut self) -> Option<DispatchEvent> {
        self.rx.recv().await
    }

    /// Take a buffered event without waiting
    pub fn try_recv(&mut self) -> Option<DispatchEvent> {
        self.rx.try_recv().ok()
    }

    /// Why the stream ended; `None` while the session is still running
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason.lock().clone()
    }
}

impl Stream for EventStream {
    type Item = DispatchEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
