use super::engine::ActuationEngine;
use super::lock::{LockFile, PidFile};
use super::protocol::{parse_request, Reply, Request, RequestError};
use super::shutdown::ShutdownCoordinator;
use super::state::SharedState;
use super::supervisor::{ConnectionSupervisor, SessionSlot};
use crate::clienv;
use crate::config::DoorConfig;
use crate::link::ActuatorLink;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, trace};

/// How long a client may take to deliver its request line. A slow or
/// stalled client only ever ties up its own connection task.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub lock_path: PathBuf,
    pub door: DoorConfig,
}

impl DaemonConfig {
    pub fn new(door: DoorConfig) -> Self {
        Self {
            socket_path: clienv::socket_path(),
            pid_path: clienv::pid_path(),
            lock_path: clienv::lock_path(),
            door,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::new(DoorConfig::default())
    }
}

pub struct DaemonServer<L: ActuatorLink> {
    config: DaemonConfig,
    link: Arc<L>,
    state: SharedState,
    slot: SessionSlot<L::Session>,
    engine: Arc<ActuationEngine<L::Session>>,
    shutdown: ShutdownCoordinator,
}

impl<L: ActuatorLink> DaemonServer<L> {
    pub fn new(config: DaemonConfig, link: L) -> Self {
        let state = SharedState::new();
        let slot: SessionSlot<L::Session> = SessionSlot::new();
        let shutdown = ShutdownCoordinator::new();
        let engine = Arc::new(ActuationEngine::new(
            &config.door,
            state.clone(),
            slot.clone(),
            shutdown.handle(),
        ));

        Self {
            config,
            link: Arc::new(link),
            state,
            slot,
            engine,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("coopd starting");

        let _lock = LockFile::acquire(&self.config.lock_path)?;

        let pid_file = PidFile::new(&self.config.pid_path);
        if let Some(pid) = pid_file.is_running()? {
            anyhow::bail!("Daemon already running with PID {}", pid);
        }
        pid_file.write()?;
        info!("PID file written: {}", self.config.pid_path.display());

        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }
        if let Some(parent) = self.config.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.config.socket_path)?;

        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config.socket_path, perms)?;
        }

        info!(
            "RPC server listening on: {}",
            self.config.socket_path.display()
        );

        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            let handle = self.shutdown.handle();

            tokio::spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM");
                        handle.shutdown();
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT");
                        handle.shutdown();
                    }
                }
            });
        }

        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&self.link),
            self.config.door.clone(),
            self.state.clone(),
            self.slot.clone(),
            self.shutdown.handle(),
        );
        let supervisor_task = tokio::spawn(supervisor.run());

        let server = Arc::new(self);
        info!("coopd ready");

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    match conn {
                        Ok((stream, _)) => {
                            let server = Arc::clone(&server);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    debug!("Connection handler error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = server.shutdown.wait() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Teardown order: the accept loop above has already stopped; the
        // supervisor observes the same signal, releases the session and
        // exits; then the socket and pid file go away.
        if let Err(e) = supervisor_task.await {
            error!("Supervisor task panicked: {}", e);
        }

        drop(listener);
        if server.config.socket_path.exists() {
            std::fs::remove_file(&server.config.socket_path)?;
        }
        pid_file.remove();

        info!("coopd stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        trace!("New connection accepted");

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        let request = match tokio::time::timeout(REQUEST_TIMEOUT, reader.read_line(&mut line)).await
        {
            Err(_) => {
                debug!("Client timed out before sending a request");
                Err(RequestError::BadRequest)
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(0)) => Err(RequestError::BadRequest),
            Ok(Ok(_)) => parse_request(&line),
        };

        let reply = match &request {
            Ok(request) => self.handle_request(request).await,
            Err(RequestError::BadRequest) => Reply::bad_request(),
            Err(RequestError::Unknown(cmd)) => Reply::unknown(cmd),
        };

        writer.write_all(reply.to_json().as_bytes()).await?;
        writer.shutdown().await?;
        trace!("Reply sent");

        // The ack has been written; now the teardown may begin.
        if matches!(request, Ok(Request::Shutdown)) {
            self.shutdown.handle().shutdown();
        }
        Ok(())
    }

    async fn handle_request(&self, request: &Request) -> Reply {
        match request {
            Request::Status => {
                debug!("Handling: status");
                Reply::Status(Box::new(self.state.snapshot()))
            }

            Request::Shutdown => {
                info!("Handling: shutdown");
                Reply::ok()
            }

            Request::OpenPulses { pulses, interval } => {
                info!(pulses, interval, "Handling: open_pulses");
                match self.engine.spawn_open_pulses(*pulses, *interval) {
                    Ok(()) => Reply::started(),
                    Err(_) => Reply::busy(),
                }
            }

            Request::Close => {
                info!("Handling: close");
                match self.engine.spawn_close() {
                    Ok(()) => Reply::ok(),
                    Err(_) => Reply::busy(),
                }
            }

            Request::ReadBattery => {
                debug!("Handling: read_battery");
                Reply::Battery {
                    battery: self.engine.read_battery().await,
                }
            }
        }
    }
}
