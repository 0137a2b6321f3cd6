//! Heartbeat controller
//!
//! Periodic liveness probe driven by HELLO. Each tick either sends a
//! heartbeat or, if the previous one was never acknowledged, recycles the
//! connection. Heartbeats bypass the rate bucket so liveness survives a
//! backlog.

use super::GatewayInner;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Per-session heartbeat state
#[derive(Debug, Default)]
pub(crate) struct HeartbeatState {
    /// Whether the most recent heartbeat was acknowledged
    pub acked: bool,

    /// When the last ack arrived (epoch milliseconds)
    pub last_ack: Option<i64>,

    /// When the last heartbeat was sent (epoch milliseconds)
    pub last_sent: Option<i64>,

    /// Interval supplied by HELLO
    pub interval_ms: Option<u64>,

    /// The beat task, while one is running
    task: Option<JoinHandle<()>>,
}

impl HeartbeatState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arm the controller from HELLO
    ///
    /// The previous beat task, if any, is stopped first; there is never
    /// more than one per engine.
    pub(crate) fn arm(&mut self, interval_ms: u64, task: JoinHandle<()>) {
        if let Some(old) = self.task.take() {
            old.abort();
        }
        self.acked = true;
        self.last_ack = Some(now_ms());
        self.last_sent = None;
        self.interval_ms = Some(interval_ms);
        self.task = Some(task);
    }

    /// Record an outbound heartbeat
    pub(crate) fn mark_sent(&mut self) {
        self.acked = false;
        self.last_sent = Some(now_ms());
    }

    /// Record an inbound HEARTBEAT_ACK
    pub(crate) fn mark_acked(&mut self) {
        self.acked = true;
        self.last_ack = Some(now_ms());
    }

    /// Whether a beat task is currently running
    #[must_use]
    pub(crate) fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the beat task and clear all state
    pub(crate) fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self = Self::new();
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The beat task: one immediate heartbeat, then one per interval
///
/// The ack check happens in `heartbeat_tick`; a missed ack recycles the
/// connection from a detached task so the teardown can stop this one.
pub(crate) async fn run_beat(client: Arc<GatewayInner>, interval_ms: u64) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));

    loop {
        // First tick completes immediately.
        ticker.tick().await;
        client.heartbeat_tick().await;
    }
}
