use crate::link::LinkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("another daemon instance holds the lock at {path}")]
    LockHeld { path: String },

    #[error("an actuation operation is already in flight")]
    Busy,

    #[error("device link error: {0}")]
    Link(#[from] LinkError),

    #[error("daemon is not running (no socket at {path})")]
    NotRunning { path: String },

    #[error("malformed RPC request: {0}")]
    BadRequest(String),

    #[error("RPC failed: {0}")]
    Rpc(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DoorError>;
