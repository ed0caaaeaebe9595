//! One-shot RPC client for the daemon's local socket.
//!
//! Each call opens a fresh connection, writes a single request line, reads
//! the reply object and lets the server close the stream - the protocol
//! carries no client sessions.

use crate::clienv;
use crate::error::{DoorError, Result};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

const RPC_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DoorClient {
    socket_path: PathBuf,
}

impl DoorClient {
    pub fn new() -> Self {
        Self {
            socket_path: clienv::socket_path(),
        }
    }

    pub fn with_socket(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Send one request object and return the parsed reply.
    pub async fn request(&self, request: Value) -> Result<Value> {
        if !self.socket_exists() {
            return Err(DoorError::NotRunning {
                path: self.socket_path.display().to_string(),
            });
        }

        let mut stream = UnixStream::connect(&self.socket_path).await?;

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;

        let mut reply = String::new();
        tokio::time::timeout(RPC_TIMEOUT, stream.read_to_string(&mut reply))
            .await
            .map_err(|_| DoorError::Rpc("timed out waiting for daemon reply".to_string()))??;

        Ok(serde_json::from_str(&reply)?)
    }

    /// Whether a daemon answers on the socket.
    pub async fn is_running(&self) -> bool {
        self.status().await.is_ok()
    }

    pub async fn status(&self) -> Result<Value> {
        self.request(json!({"cmd": "status"})).await
    }

    pub async fn open_pulses(&self, pulses: u32, interval: f64) -> Result<Value> {
        self.request(json!({
            "cmd": "open_pulses",
            "pulses": pulses,
            "interval": interval,
        }))
        .await
    }

    pub async fn close(&self) -> Result<Value> {
        self.request(json!({"cmd": "close"})).await
    }

    pub async fn read_battery(&self) -> Result<Option<u8>> {
        let reply = self.request(json!({"cmd": "read_battery"})).await?;
        Ok(reply
            .get("battery")
            .and_then(Value::as_u64)
            .map(|pct| pct as u8))
    }

    /// Ask the daemon to exit, then wait for the socket to disappear.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(json!({"cmd": "shutdown"})).await?;

        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while std::time::Instant::now() < deadline {
            if !self.socket_exists() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }
}

impl Default for DoorClient {
    fn default() -> Self {
        Self::new()
    }
}
