//! Actuation engine: turns pulse-count commands into serialized,
//! retryable protocol writes.
//!
//! At most one operation runs at a time - the busy flag is claimed
//! atomically before a task is spawned and released when it finishes,
//! success or not. The engine borrows the supervisor's session to write;
//! it never reconnects a dropped link.

use crate::config::DoorConfig;
use crate::error::Result;
use crate::link::{payload, LinkError, LinkSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::shutdown::ShutdownHandle;
use super::state::{unix_now, LastEvent, Operation, SharedState};
use super::supervisor::SessionSlot;

/// Fixed margin added to every operation's ETA, seconds.
const ETA_MARGIN_SECS: f64 = 3.0;

pub struct ActuationEngine<S: LinkSession> {
    state: SharedState,
    slot: SessionSlot<S>,
    shutdown: ShutdownHandle,
    full_open_pulses: u32,
    write_attempts: u32,
    write_retry_delay: Duration,
}

impl<S: LinkSession> ActuationEngine<S> {
    pub fn new(
        config: &DoorConfig,
        state: SharedState,
        slot: SessionSlot<S>,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            state,
            slot,
            shutdown,
            full_open_pulses: config.full_open_pulses,
            write_attempts: config.write_attempts.max(1),
            write_retry_delay: config.write_retry_delay(),
        }
    }

    /// Claim the busy flag and spawn the open operation. Replies to the
    /// caller immediately; completion is observed via `status`.
    pub fn spawn_open_pulses(self: &Arc<Self>, pulses: u32, interval: f64) -> Result<()> {
        let eta = unix_now() + pulses as f64 * interval + ETA_MARGIN_SECS;
        self.state.begin(Operation::OpenPulses, eta)?;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_open_pulses(pulses, interval).await;
        });
        Ok(())
    }

    /// Claim the busy flag and spawn the close operation.
    pub fn spawn_close(self: &Arc<Self>) -> Result<()> {
        self.state.begin(Operation::Close, unix_now() + ETA_MARGIN_SECS)?;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_close().await;
        });
        Ok(())
    }

    /// One synchronous battery read, outside the busy discipline (reads
    /// do not actuate anything).
    pub async fn read_battery(&self) -> Option<u8> {
        let session = self.slot.get()?;
        match session.read_status().await {
            Ok(packet) => {
                let percent = payload::battery_from_status(&packet)?;
                self.state.record_battery(percent, unix_now());
                Some(percent)
            }
            Err(e) => {
                debug!("Battery read failed: {}", e);
                None
            }
        }
    }

    async fn run_open_pulses(&self, pulses: u32, interval: f64) {
        let mut issued = 0u32;
        let mut error: Option<&'static str> = None;

        for i in 1..=pulses {
            if self.shutdown.is_shutdown() {
                debug!("Shutdown requested, stopping after {} pulses", issued);
                break;
            }

            let session = match self.live_session() {
                Some(session) => session,
                None => {
                    error = Some("disconnected");
                    break;
                }
            };

            if let Err(e) = self.write_with_retry(&session, &payload::OPEN_FRAME).await {
                error = Some(e);
                break;
            }
            issued = i;
            debug!("open_pulses: {}/{}", i, pulses);

            if i < pulses {
                tokio::select! {
                    _ = self.shutdown.wait() => {}
                    _ = tokio::time::sleep(Duration::from_secs_f64(interval)) => {}
                }
            }
        }

        let ok = error.is_none();
        if ok {
            info!("open_pulses: done {}", issued);
            // A partial open ends with the door still moving; the device
            // only travels while the link is held, so dropping the session
            // is what physically stops it. Full opens stay connected.
            if issued == pulses && pulses > 0 && pulses < self.full_open_pulses {
                if let Some(session) = self.slot.get() {
                    info!("Partial open, forcing disconnect to stop travel");
                    session.disconnect().await;
                }
            }
        } else {
            warn!("open_pulses: failed after {} pulses: {:?}", issued, error);
        }

        self.state.finish(LastEvent {
            op: Operation::OpenPulses,
            requested_pulses: Some(pulses),
            actual_pulses: issued,
            ok,
            error: error.map(str::to_string),
            finished_at: unix_now(),
        });
    }

    async fn run_close(&self) {
        let error: Option<&'static str> = match self.live_session() {
            None => Some("disconnected"),
            Some(session) => self
                .write_with_retry(&session, &payload::CLOSE_FRAME)
                .await
                .err(),
        };

        match error {
            None => info!("close: done"),
            Some(e) => warn!("close: failed: {}", e),
        }

        self.state.finish(LastEvent {
            op: Operation::Close,
            requested_pulses: None,
            actual_pulses: 0,
            ok: error.is_none(),
            error: error.map(str::to_string),
            finished_at: unix_now(),
        });
    }

    fn live_session(&self) -> Option<Arc<S>> {
        self.slot.get().filter(|session| session.is_connected())
    }

    /// Retrying a write on a dropped link is pointless; that surfaces as
    /// "disconnected" immediately. Everything else consumes the retry
    /// budget before failing the operation.
    async fn write_with_retry(
        &self,
        session: &Arc<S>,
        frame: &[u8],
    ) -> std::result::Result<(), &'static str> {
        for attempt in 1..=self.write_attempts {
            match session.write_command(frame).await {
                Ok(()) => return Ok(()),
                Err(LinkError::Dropped) => {
                    warn!("Link dropped mid-write");
                    return Err("disconnected");
                }
                Err(e) => {
                    warn!(
                        "Protocol write retry {}/{}: {}",
                        attempt, self.write_attempts, e
                    );
                    if attempt < self.write_attempts {
                        tokio::time::sleep(self.write_retry_delay).await;
                    }
                }
            }
        }
        warn!("Protocol write failed after {} attempts", self.write_attempts);
        Err("write_failed")
    }
}
