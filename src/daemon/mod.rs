//! Coop door daemon - persistent device link, serialized actuation,
//! local RPC.
//!
//! The daemon owns exactly one (attempted) session to the door and exposes
//! it to other local processes over a JSON-per-line Unix socket:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   coopd                     │
//! ├─────────────────────────────────────────────┤
//! │ Supervisor    │  RPC Server   │  Engine     │
//! │ (scan/connect │  (socket)     │  (pulses,   │
//! │  /backoff)    │               │   close)    │
//! ├─────────────────────────────────────────────┤
//! │            shared DaemonState               │
//! │         session slot (Arc<Session>)         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The supervisor is the only component that connects or reconnects; the
//! engine borrows whatever session is currently live. One actuation
//! operation runs at a time, gated by the busy flag in [`state`].

pub mod engine;
pub mod lock;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod supervisor;

pub use engine::ActuationEngine;
pub use protocol::{Reply, Request};
pub use server::{DaemonConfig, DaemonServer};
pub use shutdown::{ShutdownCoordinator, ShutdownHandle};
pub use state::{DaemonState, Operation, SharedState};
pub use supervisor::{Backoff, ConnectionSupervisor, SessionSlot};
