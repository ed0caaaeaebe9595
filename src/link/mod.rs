//! Actuator link - the wireless transport the daemon drives the door over.
//!
//! The transport itself is an external capability: anything that can scan
//! for the addressed device, open a session, and perform acknowledged
//! characteristic reads/writes can back the daemon. The daemon core is
//! generic over [`ActuatorLink`], with the device's binary protocol kept in
//! [`payload`] and an in-process simulator in [`sim`] for development and
//! tests.

pub mod payload;
pub mod sim;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("device not found")]
    NotFound,

    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("link dropped")]
    Dropped,
}

/// A transport capable of discovering and connecting to the door device.
#[async_trait]
pub trait ActuatorLink: Send + Sync + 'static {
    type Session: LinkSession;

    /// Search for the device with a bounded timeout. `Ok(false)` means the
    /// scan completed without seeing the device.
    async fn scan(&self, address: &str, timeout: Duration) -> Result<bool, LinkError>;

    /// Open a session to the device.
    async fn connect(&self, address: &str, timeout: Duration)
        -> Result<Self::Session, LinkError>;
}

/// A live, exclusively-held connection to the device.
///
/// Sessions are shared as `Arc<S>` between the connection supervisor (which
/// owns the lifecycle) and in-flight actuation operations (which only issue
/// protocol calls and must treat a dead session as operation failure).
#[async_trait]
pub trait LinkSession: Send + Sync + 'static {
    /// Acknowledged write to the command characteristic.
    async fn write_command(&self, payload: &[u8]) -> Result<(), LinkError>;

    /// Read the raw status packet (battery and position telemetry).
    async fn read_status(&self) -> Result<Vec<u8>, LinkError>;

    /// Whether the underlying link still reports itself live.
    fn is_connected(&self) -> bool;

    /// Tear the link down. Idempotent.
    async fn disconnect(&self);
}
