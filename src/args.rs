use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coopd")]
#[command(version)]
#[command(about = "Coop door connection and actuation daemon", long_about = None)]
pub(crate) struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the daemon in the foreground
    Run {
        /// Device address (overrides the config file)
        #[arg(long)]
        address: Option<String>,

        /// Adapter identifier (overrides the config file)
        #[arg(long)]
        adapter: Option<String>,

        /// Socket path (overrides $COOPD_SOCKET and the default)
        #[arg(long)]
        sock: Option<PathBuf>,

        /// Connect timeout in seconds (overrides the config file)
        #[arg(long)]
        connect_timeout: Option<u64>,

        /// Drive the in-process door simulator instead of real hardware
        #[arg(long)]
        simulate: bool,

        /// Log to stderr instead of the daemon log file
        #[arg(long)]
        stderr: bool,
    },

    /// Show daemon status
    Status,

    /// Open the door to a percentage of full travel
    Open {
        /// Percent open, 0-100
        percent: u32,

        /// Seconds between pulses (defaults to the configured interval)
        #[arg(long)]
        interval: Option<f64>,
    },

    /// Open the door by a raw pulse count
    OpenPulses {
        pulses: u32,

        /// Seconds between pulses (defaults to the configured interval)
        #[arg(long)]
        interval: Option<f64>,
    },

    /// Close the door
    Close,

    /// Read the battery level from the device
    Battery,

    /// Stop a running daemon
    Stop,

    /// Show the device configuration
    Config,
}
