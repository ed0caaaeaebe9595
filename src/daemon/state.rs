//! Process-wide daemon state.
//!
//! One record, created at startup and never persisted: connection status
//! cannot outlive the process, so a restart means a clean slate. The
//! supervisor and the actuation engine are the only writers (for disjoint
//! fields); RPC handlers take consistent read snapshots.

use crate::error::{DoorError, Result};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, fractional. The wire format for `eta`
/// and the battery/connect timestamps.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    OpenPulses,
    Close,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::OpenPulses => "open_pulses",
            Operation::Close => "close",
        }
    }
}

/// Monotonically increasing connection counters. Never reset while the
/// process lives.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionMetrics {
    pub connect_attempts: u64,
    pub successful_connects: u64,
    pub failed_connects: u64,
    pub disconnections: u64,
    /// Cumulative time spent connected, seconds.
    pub connected_secs: f64,
    pub last_connected_at: Option<f64>,
}

impl ConnectionMetrics {
    /// Fraction of connection attempts that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.connect_attempts == 0 {
            return 0.0;
        }
        self.successful_connects as f64 / self.connect_attempts as f64
    }
}

/// Outcome of the most recent actuation operation.
#[derive(Debug, Clone, Serialize)]
pub struct LastEvent {
    pub op: Operation,
    pub requested_pulses: Option<u32>,
    pub actual_pulses: u32,
    pub ok: bool,
    pub error: Option<String>,
    pub finished_at: f64,
}

#[derive(Debug, Default)]
pub struct DaemonState {
    pub connected: bool,
    pub busy: bool,
    pub operation: Option<Operation>,
    pub eta: Option<f64>,
    pub last_error: Option<String>,
    pub battery_percent: Option<u8>,
    pub battery_last_read: Option<f64>,
    pub metrics: ConnectionMetrics,
    pub last_event: Option<LastEvent>,
}

/// Read-consistent snapshot returned by the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub busy: bool,
    pub op: Option<Operation>,
    pub eta: Option<f64>,
    pub error: Option<String>,
    pub battery_percent: Option<u8>,
    pub battery_last_read: Option<f64>,
    pub last_event: Option<LastEvent>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub successful_connects: u64,
    pub failed_connects: u64,
    pub disconnections: u64,
    pub connected_secs: f64,
    pub last_connected_at: Option<f64>,
    pub success_rate: f64,
}

/// Cloneable handle to the daemon state.
///
/// Methods never hold the guard across an await point; each takes the
/// guard, mutates, and releases, so readers always observe a complete
/// update.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<DaemonState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DaemonState> {
        self.inner.read().expect("daemon state lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DaemonState> {
        self.inner.write().expect("daemon state lock poisoned")
    }

    /// Atomically claim the busy flag for a new operation.
    ///
    /// Sets `busy`, `operation` and `eta` together and clears `last_error`;
    /// fails with [`DoorError::Busy`] and no state change if an operation
    /// is already in flight.
    pub fn begin(&self, op: Operation, eta: f64) -> Result<()> {
        let mut state = self.write();
        if state.busy {
            return Err(DoorError::Busy);
        }
        state.busy = true;
        state.operation = Some(op);
        state.eta = Some(eta);
        state.last_error = None;
        Ok(())
    }

    /// Atomically release the busy flag and record the outcome.
    ///
    /// A failed event sets `last_error`; a successful one leaves the
    /// previous error in place (it is only cleared when the next operation
    /// begins).
    pub fn finish(&self, event: LastEvent) {
        let mut state = self.write();
        state.busy = false;
        state.operation = None;
        state.eta = None;
        if !event.ok {
            state.last_error = event.error.clone();
        }
        state.last_event = Some(event);
    }

    pub fn is_busy(&self) -> bool {
        self.read().busy
    }

    pub fn note_connect_attempt(&self) {
        self.write().metrics.connect_attempts += 1;
    }

    pub fn note_connect_failure(&self) {
        self.write().metrics.failed_connects += 1;
    }

    pub fn note_connected(&self, at: f64) {
        let mut state = self.write();
        state.connected = true;
        state.metrics.successful_connects += 1;
        state.metrics.last_connected_at = Some(at);
    }

    pub fn note_disconnected(&self, session_secs: f64) {
        let mut state = self.write();
        state.connected = false;
        state.metrics.disconnections += 1;
        state.metrics.connected_secs += session_secs;
    }

    pub fn record_battery(&self, percent: u8, at: f64) {
        let mut state = self.write();
        state.battery_percent = Some(percent);
        state.battery_last_read = Some(at);
    }

    pub fn is_connected(&self) -> bool {
        self.read().connected
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.read();
        StatusSnapshot {
            connected: state.connected,
            busy: state.busy,
            op: state.operation,
            eta: state.eta,
            error: state.last_error.clone(),
            battery_percent: state.battery_percent,
            battery_last_read: state.battery_last_read,
            last_event: state.last_event.clone(),
            metrics: MetricsSnapshot {
                connect_attempts: state.metrics.connect_attempts,
                successful_connects: state.metrics.successful_connects,
                failed_connects: state.metrics.failed_connects,
                disconnections: state.metrics.disconnections,
                connected_secs: state.metrics.connected_secs,
                last_connected_at: state.metrics.last_connected_at,
                success_rate: state.metrics.success_rate(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(op: Operation, ok: bool, error: Option<&str>) -> LastEvent {
        LastEvent {
            op,
            requested_pulses: None,
            actual_pulses: 0,
            ok,
            error: error.map(str::to_string),
            finished_at: unix_now(),
        }
    }

    #[test]
    fn begin_rejects_while_busy() {
        let state = SharedState::new();
        state.begin(Operation::OpenPulses, 123.0).unwrap();

        assert!(matches!(
            state.begin(Operation::Close, 456.0),
            Err(DoorError::Busy)
        ));

        // The rejected begin must not have mutated anything.
        let snap = state.snapshot();
        assert_eq!(snap.op, Some(Operation::OpenPulses));
        assert_eq!(snap.eta, Some(123.0));
    }

    #[test]
    fn finish_clears_busy_and_eta() {
        let state = SharedState::new();
        state.begin(Operation::Close, 1.0).unwrap();
        state.finish(event(Operation::Close, true, None));

        let snap = state.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.op, None);
        assert_eq!(snap.eta, None);
        assert!(snap.last_event.unwrap().ok);
    }

    #[test]
    fn error_survives_until_next_begin() {
        let state = SharedState::new();
        state.begin(Operation::OpenPulses, 1.0).unwrap();
        state.finish(event(Operation::OpenPulses, false, Some("write_failed")));
        assert_eq!(state.last_error().as_deref(), Some("write_failed"));

        // A later successful operation does not clear it on finish...
        state.begin(Operation::Close, 2.0).unwrap();
        // ...but beginning the operation does.
        assert_eq!(state.last_error(), None);
        state.finish(event(Operation::Close, true, None));
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn success_rate_is_derived() {
        let state = SharedState::new();
        for _ in 0..4 {
            state.note_connect_attempt();
        }
        state.note_connected(unix_now());
        state.note_connect_failure();
        state.note_connect_failure();
        state.note_connect_failure();

        let metrics = state.snapshot().metrics;
        assert_eq!(metrics.connect_attempts, 4);
        assert_eq!(metrics.successful_connects, 1);
        assert!((metrics.success_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn connected_duration_accumulates() {
        let state = SharedState::new();
        state.note_connected(unix_now());
        state.note_disconnected(10.0);
        state.note_connected(unix_now());
        state.note_disconnected(5.5);

        let metrics = state.snapshot().metrics;
        assert_eq!(metrics.disconnections, 2);
        assert!((metrics.connected_secs - 15.5).abs() < f64::EPSILON);
    }
}
