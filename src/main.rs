mod args;

use args::{Cli, Commands};
use clap::Parser;
use coopd::daemon::{DaemonConfig, DaemonServer};
use coopd::link::sim::SimulatedDoor;
use coopd::{clienv, travel, DoorClient, DoorConfig};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let verbose = cli.verbose;

    match cli.command {
        Commands::Run {
            address,
            adapter,
            sock,
            connect_timeout,
            simulate,
            stderr,
        } => cmd_run(address, adapter, sock, connect_timeout, simulate, stderr, verbose).await,
        Commands::Status => cmd_status(verbose).await,
        Commands::Open { percent, interval } => cmd_open(percent, interval, verbose).await,
        Commands::OpenPulses { pulses, interval } => {
            cmd_open_pulses(pulses, interval, verbose).await
        }
        Commands::Close => cmd_close(verbose).await,
        Commands::Battery => cmd_battery(verbose).await,
        Commands::Stop => cmd_stop(verbose).await,
        Commands::Config => cmd_config(verbose),
    }
}

fn init_stderr_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Append timestamped, ANSI-free lines to the daemon log file.
fn init_file_logging(verbose: bool) -> anyhow::Result<()> {
    let log_path = clienv::log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

async fn cmd_run(
    address: Option<String>,
    adapter: Option<String>,
    sock: Option<PathBuf>,
    connect_timeout: Option<u64>,
    simulate: bool,
    stderr: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    if stderr {
        init_stderr_logging(verbose);
    } else {
        init_file_logging(verbose)?;
    }

    let mut door = DoorConfig::load()?;
    if let Some(address) = address {
        door.address = address;
    }
    if let Some(adapter) = adapter {
        door.adapter = adapter;
    }
    if let Some(secs) = connect_timeout {
        door.connect_timeout_secs = secs;
    }

    let mut config = DaemonConfig::new(door);
    if let Some(sock) = sock {
        config.socket_path = sock;
    }

    if !simulate {
        anyhow::bail!(
            "no wireless backend is compiled into this binary; run with --simulate, \
             or embed coopd as a library and supply a hardware ActuatorLink"
        );
    }

    let server = DaemonServer::new(config, SimulatedDoor::new());
    server.run().await
}

async fn cmd_status(verbose: bool) -> anyhow::Result<()> {
    init_stderr_logging(verbose);
    let status = DoorClient::new().status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn cmd_open(percent: u32, interval: Option<f64>, verbose: bool) -> anyhow::Result<()> {
    init_stderr_logging(verbose);
    let config = DoorConfig::load()?;

    let pulses = travel::percent_to_pulses(percent, config.full_open_pulses);
    if pulses == 0 {
        println!("0% requested, nothing to do");
        return Ok(());
    }

    let interval = interval.unwrap_or(config.pulse_interval_secs);
    println!("Opening {}% -> {} pulse(s) @ {:.2}s", percent.min(100), pulses, interval);
    send_open(pulses, interval).await
}

async fn cmd_open_pulses(
    pulses: u32,
    interval: Option<f64>,
    verbose: bool,
) -> anyhow::Result<()> {
    init_stderr_logging(verbose);
    let config = DoorConfig::load()?;

    let pulses = pulses.max(1);
    let interval = interval.unwrap_or(config.pulse_interval_secs);
    println!("Opening (raw) -> {} pulse(s) @ {:.2}s", pulses, interval);
    send_open(pulses, interval).await
}

async fn send_open(pulses: u32, interval: f64) -> anyhow::Result<()> {
    let reply = DoorClient::new().open_pulses(pulses, interval).await?;
    if reply["started"].as_bool() == Some(true) {
        println!("Started. Poll `coopd status` for completion.");
    } else {
        println!("{}", reply);
    }
    Ok(())
}

async fn cmd_close(verbose: bool) -> anyhow::Result<()> {
    init_stderr_logging(verbose);
    let reply = DoorClient::new().close().await?;
    if reply["ok"].as_bool() == Some(true) {
        println!("Close sent.");
    } else {
        println!("{}", reply);
    }
    Ok(())
}

async fn cmd_battery(verbose: bool) -> anyhow::Result<()> {
    init_stderr_logging(verbose);
    match DoorClient::new().read_battery().await? {
        Some(percent) => println!("Battery: {}%", percent),
        None => println!("Battery unavailable (device not connected)"),
    }
    Ok(())
}

async fn cmd_stop(verbose: bool) -> anyhow::Result<()> {
    init_stderr_logging(verbose);
    let client = DoorClient::new();
    if !client.socket_exists() {
        println!("Daemon is not running");
        return Ok(());
    }
    client.shutdown().await?;
    println!("Daemon stopped");
    Ok(())
}

fn cmd_config(verbose: bool) -> anyhow::Result<()> {
    init_stderr_logging(verbose);
    let config = DoorConfig::load()?;
    println!("# {}", DoorConfig::config_path().display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
