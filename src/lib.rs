pub mod clienv;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod link;
pub mod travel;

pub use client::DoorClient;
pub use config::DoorConfig;
pub use error::{DoorError, Result};
