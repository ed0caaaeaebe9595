//! Connection supervisor: keeps exactly one live session to the door for
//! as long as the daemon runs.
//!
//! Perpetual scan -> connect -> hold -> backoff loop. Device absence and
//! transport errors are never fatal; they feed the metrics counters and
//! the next backoff sleep. The backoff delay resets to its floor only on
//! a successful connection.

use crate::config::DoorConfig;
use crate::link::{payload, ActuatorLink, LinkSession};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::shutdown::ShutdownHandle;
use super::state::{unix_now, SharedState};

/// Liveness poll cadence while connected.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Exponential backoff between unsuccessful connection attempts.
#[derive(Debug)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// The delay to sleep now; doubles the stored delay up to the ceiling.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    /// Back to the floor. Called only after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

/// Shared slot holding the currently-live session, if any.
///
/// The supervisor publishes into it on connect and clears it on loss; the
/// actuation engine clones the `Arc` out to issue writes. The engine never
/// reconnects - if the slot is empty or the session is dead, the operation
/// fails with "disconnected".
pub struct SessionSlot<S> {
    inner: Arc<Mutex<Option<Arc<S>>>>,
}

impl<S> Clone for SessionSlot<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> Default for SessionSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SessionSlot<S> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn publish(&self, session: Arc<S>) {
        *self.inner.lock().expect("session slot lock poisoned") = Some(session);
    }

    pub fn clear(&self) {
        *self.inner.lock().expect("session slot lock poisoned") = None;
    }

    pub fn get(&self) -> Option<Arc<S>> {
        self.inner.lock().expect("session slot lock poisoned").clone()
    }
}

pub struct ConnectionSupervisor<L: ActuatorLink> {
    link: Arc<L>,
    config: DoorConfig,
    state: SharedState,
    slot: SessionSlot<L::Session>,
    shutdown: ShutdownHandle,
}

impl<L: ActuatorLink> ConnectionSupervisor<L> {
    pub fn new(
        link: Arc<L>,
        config: DoorConfig,
        state: SharedState,
        slot: SessionSlot<L::Session>,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            link,
            config,
            state,
            slot,
            shutdown,
        }
    }

    /// Run until shutdown. Spawned as a background task for the whole
    /// process lifetime.
    pub async fn run(self) {
        info!(
            address = %self.config.address,
            adapter = %self.config.adapter,
            "Connection supervisor started"
        );

        let mut backoff = Backoff::new(
            Duration::from_secs(self.config.backoff_floor_secs),
            Duration::from_secs(self.config.backoff_ceiling_secs),
        );

        while !self.shutdown.is_shutdown() {
            let session = tokio::select! {
                _ = self.shutdown.wait() => break,
                session = self.try_connect() => session,
            };
            if let Some(session) = session {
                backoff.reset();
                self.hold(session).await;
            }

            if self.shutdown.is_shutdown() {
                break;
            }

            let delay = backoff.next();
            debug!(delay_secs = delay.as_secs_f64(), "Backing off before next scan");
            tokio::select! {
                _ = self.shutdown.wait() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Connection supervisor stopped");
    }

    /// One scan + connect attempt. Any failure lands in the metrics and
    /// sends the caller to backoff.
    async fn try_connect(&self) -> Option<Arc<L::Session>> {
        self.state.note_connect_attempt();

        debug!("Scanning for device");
        match self
            .link
            .scan(&self.config.address, self.config.scan_timeout())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("Device not found");
                self.state.note_connect_failure();
                return None;
            }
            Err(e) => {
                warn!("Scan error: {}", e);
                self.state.note_connect_failure();
                return None;
            }
        }

        debug!("Connecting");
        match self
            .link
            .connect(&self.config.address, self.config.connect_timeout())
            .await
        {
            Ok(session) => {
                info!("Connected");
                self.state.note_connected(unix_now());
                Some(Arc::new(session))
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.state.note_connect_failure();
                None
            }
        }
    }

    /// Hold a live session: publish it, poll liveness, refresh the battery
    /// reading periodically. Returns when the link drops or shutdown is
    /// requested.
    async fn hold(&self, session: Arc<L::Session>) {
        self.slot.publish(session.clone());
        let connected_at = Instant::now();

        self.read_battery(&session).await;
        let mut battery_read_at = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => {
                    debug!("Shutdown requested, releasing session");
                    break;
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if !session.is_connected() {
                        info!("Link dropped");
                        break;
                    }
                    if battery_read_at.elapsed() >= self.config.battery_refresh() {
                        self.read_battery(&session).await;
                        battery_read_at = Instant::now();
                    }
                }
            }
        }

        self.slot.clear();
        session.disconnect().await;
        self.state.note_disconnected(connected_at.elapsed().as_secs_f64());
    }

    /// Best-effort battery read. Failures never affect connection state.
    async fn read_battery(&self, session: &Arc<L::Session>) {
        match session.read_status().await {
            Ok(packet) => {
                if let Some(percent) = payload::battery_from_status(&packet) {
                    debug!(percent, "Battery reading");
                    self.state.record_battery(percent, unix_now());
                }
            }
            Err(e) => debug!("Battery read failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::shutdown::ShutdownCoordinator;
    use crate::link::sim::SimulatedDoor;

    fn test_config() -> DoorConfig {
        DoorConfig {
            backoff_floor_secs: 1,
            backoff_ceiling_secs: 60,
            ..DoorConfig::default()
        }
    }

    async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[test]
    fn backoff_doubles_to_ceiling_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));

        let mut delays = Vec::new();
        for _ in 0..8 {
            delays.push(backoff.next());
        }

        // 1, 2, 4, 8, 16, 32, 60, 60 - monotonically non-decreasing, capped.
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[5], Duration::from_secs(32));
        assert_eq!(delays[6], Duration::from_secs(60));
        assert_eq!(delays[7], Duration::from_secs(60));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));

        backoff.reset();
        assert_eq!(backoff.next(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn connects_and_publishes_session() {
        let door = SimulatedDoor::new();
        door.set_battery(73);
        let state = SharedState::new();
        let slot: SessionSlot<_> = SessionSlot::new();
        let coordinator = ShutdownCoordinator::new();

        let supervisor = ConnectionSupervisor::new(
            Arc::new(door.clone()),
            test_config(),
            state.clone(),
            slot.clone(),
            coordinator.handle(),
        );
        let task = tokio::spawn(supervisor.run());

        assert!(wait_until(Duration::from_secs(2), || state.is_connected()).await);
        assert!(slot.get().is_some());

        let snap = state.snapshot();
        assert_eq!(snap.metrics.successful_connects, 1);
        assert_eq!(snap.battery_percent, Some(73));

        coordinator.handle().shutdown();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("supervisor did not stop")
            .unwrap();

        // Session released on shutdown.
        assert!(slot.get().is_none());
        assert!(!state.is_connected());
    }

    #[tokio::test]
    async fn reconnects_after_link_drop() {
        let door = SimulatedDoor::new();
        let state = SharedState::new();
        let slot: SessionSlot<_> = SessionSlot::new();
        let coordinator = ShutdownCoordinator::new();

        let config = DoorConfig {
            backoff_floor_secs: 0,
            ..test_config()
        };
        let supervisor = ConnectionSupervisor::new(
            Arc::new(door.clone()),
            config,
            state.clone(),
            slot.clone(),
            coordinator.handle(),
        );
        let task = tokio::spawn(supervisor.run());

        assert!(wait_until(Duration::from_secs(2), || state.is_connected()).await);
        door.drop_link();

        assert!(wait_until(Duration::from_secs(3), || door.connect_count() >= 2).await);
        let snap = state.snapshot();
        assert!(snap.metrics.disconnections >= 1);
        assert!(snap.metrics.successful_connects >= 2);

        coordinator.handle().shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
    }

    #[tokio::test]
    async fn absent_device_counts_failed_attempts() {
        let door = SimulatedDoor::new();
        door.set_present(false);
        let state = SharedState::new();
        let slot: SessionSlot<_> = SessionSlot::new();
        let coordinator = ShutdownCoordinator::new();

        let config = DoorConfig {
            backoff_floor_secs: 0,
            ..test_config()
        };
        let supervisor = ConnectionSupervisor::new(
            Arc::new(door),
            config,
            state.clone(),
            slot,
            coordinator.handle(),
        );
        let task = tokio::spawn(supervisor.run());

        assert!(
            wait_until(Duration::from_secs(2), || {
                state.snapshot().metrics.failed_connects >= 2
            })
            .await
        );
        assert!(!state.is_connected());

        coordinator.handle().shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
    }
}
