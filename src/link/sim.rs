//! In-process door simulator.
//!
//! Implements [`ActuatorLink`] against a scriptable fake device: presence,
//! connect failures, write failures and the battery reading can all be
//! adjusted while the daemon is running against it. Written frames are
//! captured with timestamps so tests can assert pulse counts and spacing.

use super::{payload, ActuatorLink, LinkError, LinkSession};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct SimShared {
    absent: AtomicBool,
    connect_failures: AtomicU32,
    write_failures: AtomicU32,
    battery: AtomicU8,
    connects: AtomicU32,
    writes: Mutex<Vec<(Vec<u8>, Instant)>>,
    live: Mutex<Option<Arc<AtomicBool>>>,
}

/// Scriptable fake door device.
#[derive(Clone)]
pub struct SimulatedDoor {
    shared: Arc<SimShared>,
}

impl SimulatedDoor {
    pub fn new() -> Self {
        let shared = SimShared {
            battery: AtomicU8::new(88),
            ..Default::default()
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Make the device visible/invisible to scans.
    pub fn set_present(&self, present: bool) {
        self.shared.absent.store(!present, Ordering::SeqCst);
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Reject the next `n` command writes.
    pub fn fail_next_writes(&self, n: u32) {
        self.shared.write_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_battery(&self, percent: u8) {
        self.shared.battery.store(percent, Ordering::SeqCst);
    }

    /// Kill the currently-live session, as a radio dropout would.
    pub fn drop_link(&self) {
        if let Some(flag) = self.shared.live.lock().expect("sim lock poisoned").as_ref() {
            flag.store(false, Ordering::SeqCst);
        }
    }

    /// Whether a session is currently live.
    pub fn link_up(&self) -> bool {
        self.shared
            .live
            .lock()
            .expect("sim lock poisoned")
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Total successful connects since creation.
    pub fn connect_count(&self) -> u32 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Frames written so far.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.shared
            .writes
            .lock()
            .expect("sim lock poisoned")
            .iter()
            .map(|(frame, _)| frame.clone())
            .collect()
    }

    /// Instants at which each write landed.
    pub fn write_instants(&self) -> Vec<Instant> {
        self.shared
            .writes
            .lock()
            .expect("sim lock poisoned")
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    /// Number of open pulses written so far.
    pub fn open_pulse_count(&self) -> usize {
        self.shared
            .writes
            .lock()
            .expect("sim lock poisoned")
            .iter()
            .filter(|(frame, _)| frame.as_slice() == payload::OPEN_FRAME.as_slice())
            .count()
    }
}

impl Default for SimulatedDoor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActuatorLink for SimulatedDoor {
    type Session = SimSession;

    async fn scan(&self, _address: &str, _timeout: Duration) -> Result<bool, LinkError> {
        Ok(!self.shared.absent.load(Ordering::SeqCst))
    }

    async fn connect(&self, _address: &str, _timeout: Duration) -> Result<SimSession, LinkError> {
        if self.shared.absent.load(Ordering::SeqCst) {
            return Err(LinkError::NotFound);
        }
        let pending = self.shared.connect_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.shared
                .connect_failures
                .store(pending - 1, Ordering::SeqCst);
            return Err(LinkError::ConnectFailed("simulated failure".to_string()));
        }

        let connected = Arc::new(AtomicBool::new(true));
        *self.shared.live.lock().expect("sim lock poisoned") = Some(connected.clone());
        self.shared.connects.fetch_add(1, Ordering::SeqCst);

        Ok(SimSession {
            shared: self.shared.clone(),
            connected,
        })
    }
}

/// A live session against the simulator.
pub struct SimSession {
    shared: Arc<SimShared>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl LinkSession for SimSession {
    async fn write_command(&self, payload: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Dropped);
        }
        let pending = self.shared.write_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.shared
                .write_failures
                .store(pending - 1, Ordering::SeqCst);
            return Err(LinkError::WriteRejected("simulated rejection".to_string()));
        }
        self.shared
            .writes
            .lock()
            .expect("sim lock poisoned")
            .push((payload.to_vec(), Instant::now()));
        Ok(())
    }

    async fn read_status(&self) -> Result<Vec<u8>, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Dropped);
        }
        let mut packet = vec![0u8; payload::BATTERY_OFFSET + 1];
        packet[payload::BATTERY_OFFSET] = self.shared.battery.load(Ordering::SeqCst);
        Ok(packet)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_write_and_read_battery() {
        let door = SimulatedDoor::new();
        door.set_battery(64);

        let session = door
            .connect("00:80:E1:22:EE:F2", Duration::from_secs(1))
            .await
            .unwrap();
        session.write_command(&payload::OPEN_FRAME).await.unwrap();

        let packet = session.read_status().await.unwrap();
        assert_eq!(payload::battery_from_status(&packet), Some(64));
        assert_eq!(door.open_pulse_count(), 1);
    }

    #[tokio::test]
    async fn absent_device_is_not_scanned_or_connected() {
        let door = SimulatedDoor::new();
        door.set_present(false);

        assert!(!door.scan("x", Duration::from_secs(1)).await.unwrap());
        assert!(door.connect("x", Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn dropped_session_rejects_protocol_calls() {
        let door = SimulatedDoor::new();
        let session = door.connect("x", Duration::from_secs(1)).await.unwrap();

        door.drop_link();
        assert!(!session.is_connected());
        assert!(matches!(
            session.write_command(&payload::OPEN_FRAME).await,
            Err(LinkError::Dropped)
        ));
    }

    #[tokio::test]
    async fn scripted_write_failures_are_consumed() {
        let door = SimulatedDoor::new();
        let session = door.connect("x", Duration::from_secs(1)).await.unwrap();

        door.fail_next_writes(2);
        assert!(session.write_command(&payload::OPEN_FRAME).await.is_err());
        assert!(session.write_command(&payload::OPEN_FRAME).await.is_err());
        assert!(session.write_command(&payload::OPEN_FRAME).await.is_ok());
    }
}
