//! Heartbeat controller
//!
//! Runs the liveness timer for one connection. The first beat is jittered
//! within the interval; every beat after that waits the full interval. If a
//! tick finds the previous beat unacknowledged, the owner is told the
//! connection is zombied and the timer stops.

use crate::protocol::{encode, GatewayMessage};
use crate::session::SharedTracker;
use crate::transport::{FrameSender, TransportResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Signals sent from the heartbeat task to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// An interval passed without an ack for the last beat
    Zombied,
}

#[derive(Debug)]
struct HeartbeatState {
    acked: bool,
    last_sent_at: Option<Instant>,
    last_ack_at: Option<Instant>,
}

/// Heartbeat timer for a single connection
pub struct HeartbeatController {
    interval: Duration,
    state: Arc<Mutex<HeartbeatState>>,
    sender: FrameSender,
    tracker: SharedTracker,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatController {
    /// Start the timer
    ///
    /// Beats carry the tracker's last sequence number and are written through `sender`.
    pub fn start(
        interval: Duration,
        sender: FrameSender,
        tracker: SharedTracker,
        signals: mpsc::Sender<HeartbeatSignal>,
    ) -> Self {
        let state = Arc::new(Mutex::new(HeartbeatState {
            acked: true,
            last_sent_at: None,
            last_ack_at: None,
        }));

        let task = tokio::spawn(run(
            interval,
            Arc::clone(&state),
            sender.clone(),
            Arc::clone(&tracker),
            signals,
        ));

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Heartbeat started");

        Self {
            interval,
            state,
            sender,
            tracker,
            task: Some(task),
        }
    }

    /// Record a Heartbeat ACK
    pub fn on_ack(&self) {
        let mut state = self.state.lock();
        state.acked = true;
        state.last_ack_at = Some(Instant::now());
    }

    /// Send a beat right away, outside the timer (the server asked for one)
    pub async fn beat_now(&self) -> TransportResult<()> {
        let sequence = self.tracker.lock().sequence();
        self.state.lock().last_sent_at = Some(Instant::now());
        tracing::trace!(seq = ?sequence, "Heartbeat requested by gateway");
        self.sender
            .send_text(encode(&GatewayMessage::heartbeat(sequence)))
            .await
    }

    /// Stop the timer; idempotent
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Stop the timer and wait until the task has finished
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Round trip of the last acknowledged beat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        let state = self.state.lock();
        match (state.last_sent_at, state.last_ack_at) {
            (Some(sent), Some(acked)) if acked >= sent => Some(acked - sent),
            _ => None,
        }
    }
}

impl Drop for HeartbeatController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    interval: Duration,
    state: Arc<Mutex<HeartbeatState>>,
    sender: FrameSender,
    tracker: SharedTracker,
    signals: mpsc::Sender<HeartbeatSignal>,
) {
    tokio::time::sleep(interval.mul_f64(rand::random::<f64>())).await;

    loop {
        let acked = {
            let mut state = state.lock();
            let acked = state.acked;
            if acked {
                state.acked = false;
                state.last_sent_at = Some(Instant::now());
            }
            acked
        };

        if !acked {
            tracing::warn!(
                interval_ms = interval.as_millis() as u64,
                "Heartbeat not acknowledged, connection zombied"
            );
            let _ = signals.send(HeartbeatSignal::Zombied).await;
            return;
        }

        let sequence = tracker.lock().sequence();
        tracing::trace!(seq = ?sequence, "Sending heartbeat");
        if sender
            .send_text(encode(&GatewayMessage::heartbeat(sequence)))
            .await
            .is_err()
        {
            tracing::debug!("Connection writer gone, heartbeat stopped");
            return;
        }

        tokio::time::sleep(interval).await;
    }
}
