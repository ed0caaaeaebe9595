use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

fn default_adapter() -> String {
    "hci0".to_string()
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_scan_timeout() -> u64 {
    8
}

fn default_full_open_pulses() -> u32 {
    14
}

fn default_pulse_interval() -> f64 {
    2.0
}

fn default_backoff_floor() -> u64 {
    1
}

fn default_backoff_ceiling() -> u64 {
    60
}

fn default_battery_refresh() -> u64 {
    300
}

fn default_write_attempts() -> u32 {
    3
}

fn default_write_retry_delay_ms() -> u64 {
    250
}

/// Device and link parameters consumed by the daemon at startup.
///
/// The automation/schedule configuration lives elsewhere and is owned by
/// the external scheduler; the daemon only reads this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorConfig {
    /// Device address on the wireless transport (e.g. "00:80:E1:22:EE:F2")
    pub address: String,
    /// Local adapter identifier
    #[serde(default = "default_adapter")]
    pub adapter: String,
    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Scan timeout in seconds
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
    /// Pulses needed to drive the door fully open
    #[serde(default = "default_full_open_pulses")]
    pub full_open_pulses: u32,
    /// Default spacing between open pulses, seconds
    #[serde(default = "default_pulse_interval")]
    pub pulse_interval_secs: f64,
    /// Reconnect backoff floor, seconds
    #[serde(default = "default_backoff_floor")]
    pub backoff_floor_secs: u64,
    /// Reconnect backoff ceiling, seconds
    #[serde(default = "default_backoff_ceiling")]
    pub backoff_ceiling_secs: u64,
    /// How often to refresh the battery reading while connected, seconds
    #[serde(default = "default_battery_refresh")]
    pub battery_refresh_secs: u64,
    /// Attempts per protocol write before the operation fails
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,
    /// Delay between write attempts, milliseconds
    #[serde(default = "default_write_retry_delay_ms")]
    pub write_retry_delay_ms: u64,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            address: "00:80:E1:22:EE:F2".to_string(),
            adapter: default_adapter(),
            connect_timeout_secs: default_connect_timeout(),
            scan_timeout_secs: default_scan_timeout(),
            full_open_pulses: default_full_open_pulses(),
            pulse_interval_secs: default_pulse_interval(),
            backoff_floor_secs: default_backoff_floor(),
            backoff_ceiling_secs: default_backoff_ceiling(),
            battery_refresh_secs: default_battery_refresh(),
            write_attempts: default_write_attempts(),
            write_retry_delay_ms: default_write_retry_delay_ms(),
        }
    }
}

impl DoorConfig {
    /// $COOPD_CONFIG_DIR/config.toml or ~/.config/coopdoor/config.toml
    pub fn config_path() -> PathBuf {
        crate::clienv::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        tracing::trace!(path = %path.display(), "Loading door config");

        if !path.exists() {
            tracing::trace!("Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        tracing::trace!(address = %config.address, adapter = %config.adapter, "Door config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        tracing::trace!(path = %path.display(), "Saving door config");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }

    pub fn battery_refresh(&self) -> Duration {
        Duration::from_secs(self.battery_refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device() {
        let config = DoorConfig::default();
        assert_eq!(config.adapter, "hci0");
        assert_eq!(config.full_open_pulses, 14);
        assert_eq!(config.backoff_ceiling_secs, 60);
        assert_eq!(config.write_attempts, 3);
    }

    #[test]
    fn roundtrips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = DoorConfig::default();
        config.address = "AA:BB:CC:DD:EE:FF".to_string();
        config.full_open_pulses = 20;
        config.save_to(&path).unwrap();

        let loaded = DoorConfig::load_from(&path).unwrap();
        assert_eq!(loaded.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(loaded.full_open_pulses, 20);
        assert_eq!(loaded.pulse_interval_secs, 2.0);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = DoorConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.full_open_pulses, 14);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "address = \"11:22:33:44:55:66\"\n").unwrap();

        let loaded = DoorConfig::load_from(&path).unwrap();
        assert_eq!(loaded.address, "11:22:33:44:55:66");
        assert_eq!(loaded.connect_timeout_secs, 15);
    }
}
