use std::path::PathBuf;

// Environment overrides. Each falls back to a well-known location under
// the user's cache/config directories.
pub const ENV_RUNTIME_DIR: &str = "COOPD_RUNTIME_DIR";
pub const ENV_SOCKET: &str = "COOPD_SOCKET";
pub const ENV_PID: &str = "COOPD_PID";
pub const ENV_LOG: &str = "COOPD_LOG";
pub const ENV_CONFIG_DIR: &str = "COOPD_CONFIG_DIR";

const COOPDOOR_SUBDIR: &str = "coopdoor";
const FALLBACK_RUNTIME_DIR: &str = "/tmp/coopdoor";

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Private runtime directory ($COOPD_RUNTIME_DIR or ~/.cache/coopdoor)
pub fn runtime_dir() -> PathBuf {
    let dir = env_path(ENV_RUNTIME_DIR).unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(FALLBACK_RUNTIME_DIR))
            .join(COOPDOOR_SUBDIR)
    });
    tracing::trace!(dir = %dir.display(), "Resolved runtime directory");
    dir
}

/// RPC socket path ($COOPD_SOCKET or <runtime>/door.sock)
pub fn socket_path() -> PathBuf {
    env_path(ENV_SOCKET).unwrap_or_else(|| runtime_dir().join("door.sock"))
}

/// PID file path ($COOPD_PID or <runtime>/coopd.pid)
pub fn pid_path() -> PathBuf {
    env_path(ENV_PID).unwrap_or_else(|| runtime_dir().join("coopd.pid"))
}

/// Exclusive process lock path (<runtime>/coopd.lock)
pub fn lock_path() -> PathBuf {
    runtime_dir().join("coopd.lock")
}

/// Daemon log file path ($COOPD_LOG or <runtime>/coopd.log)
pub fn log_path() -> PathBuf {
    env_path(ENV_LOG).unwrap_or_else(|| runtime_dir().join("coopd.log"))
}

/// Config directory ($COOPD_CONFIG_DIR or ~/.config/coopdoor)
pub fn config_dir() -> PathBuf {
    let dir = env_path(ENV_CONFIG_DIR).unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(COOPDOOR_SUBDIR)
    });
    tracing::trace!(dir = %dir.display(), "Resolved config directory");
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_lives_under_runtime_dir() {
        std::env::remove_var(ENV_SOCKET);
        std::env::remove_var(ENV_RUNTIME_DIR);
        let sock = socket_path();
        assert!(sock.ends_with("coopdoor/door.sock"));
    }

    #[test]
    fn env_override_wins() {
        std::env::set_var(ENV_LOG, "/tmp/other.log");
        assert_eq!(log_path(), PathBuf::from("/tmp/other.log"));
        std::env::remove_var(ENV_LOG);
    }
}
