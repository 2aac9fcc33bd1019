// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use usbwatch_sys::device::DEFAULT_POLL_INTERVAL;
use usbwatch_sys::probe::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use usbwatch_sys::{DEFAULT_REGISTRY_ROOT, DeviceMonitorConfig, FsMonitorConfig, MountProbe};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Where aggregated events are delivered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable blocks on stdout
    #[default]
    Console,
    /// One JSON object per line on stdout
    Json,
    /// Structured records through the log pipeline
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceSettings {
    pub enabled: bool,
    pub registry_root: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            registry_root: PathBuf::from(DEFAULT_REGISTRY_ROOT),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FsSettings {
    pub enabled: bool,
    /// Mount root to watch; resolved from the current user when unset
    pub watch_root: Option<PathBuf>,
    pub mount_probe_attempts: u32,
    pub mount_probe_delay_ms: u64,
}

impl Default for FsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            watch_root: None,
            mount_probe_attempts: DEFAULT_MAX_ATTEMPTS,
            mount_probe_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub log_level: LoggingLevel,
    pub log_to_disk: bool,
    pub output: OutputFormat,
    pub device: DeviceSettings,
    pub fs: FsSettings,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&raw).map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let config: Config = toml::from_str(raw).map_err(|error| error.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.device.poll_interval_ms == 0 {
            return Err("device.poll_interval_ms must be greater than zero".to_string());
        }
        if self.fs.mount_probe_attempts == 0 {
            return Err("fs.mount_probe_attempts must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn device_monitor_config(&self) -> DeviceMonitorConfig {
        DeviceMonitorConfig {
            registry_root: self.device.registry_root.clone(),
            poll_interval: Duration::from_millis(self.device.poll_interval_ms.max(1)),
        }
    }

    pub fn fs_monitor_config(&self, watch_root: PathBuf) -> FsMonitorConfig {
        FsMonitorConfig {
            watch_root,
            probe: MountProbe::new(
                self.fs.mount_probe_attempts,
                Duration::from_millis(self.fs.mount_probe_delay_ms),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").expect("parse empty config");
        assert_eq!(config, Config::default());
        assert_eq!(config.device.poll_interval_ms, 1000);
        assert_eq!(config.fs.mount_probe_attempts, 8);
        assert_eq!(config.fs.mount_probe_delay_ms, 500);
        assert_eq!(config.device.registry_root, PathBuf::from("/sys/bus/usb/devices"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
log_level = "debug"
output = "json"

[device]
poll_interval_ms = 250

[fs]
watch_root = "/run/media/alice"
"#,
        )
        .expect("parse config");

        assert_eq!(config.log_level, LoggingLevel::Debug);
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.device.poll_interval_ms, 250);
        assert!(config.device.enabled);
        assert_eq!(config.fs.watch_root, Some(PathBuf::from("/run/media/alice")));
        assert_eq!(config.fs.mount_probe_attempts, 8);

        let device = config.device_monitor_config();
        assert_eq!(device.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn rejects_zero_intervals_and_unknown_levels() {
        assert!(Config::parse("[device]\npoll_interval_ms = 0").is_err());
        assert!(Config::parse("[fs]\nmount_probe_attempts = 0").is_err());
        assert!(Config::parse("log_level = \"loud\"").is_err());
    }

    #[test]
    fn probe_settings_flow_into_fs_config() {
        let mut config = Config::default();
        config.fs.mount_probe_attempts = 3;
        config.fs.mount_probe_delay_ms = 100;

        let fs_config = config.fs_monitor_config(PathBuf::from("/media"));
        assert_eq!(fs_config.watch_root, PathBuf::from("/media"));
        assert_eq!(fs_config.probe.max_attempts(), 3);
        assert_eq!(fs_config.probe.retry_delay(), Duration::from_millis(100));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("usbwatch-config-does-not-exist.toml");
        assert!(matches!(Config::load(&path), Err(ConfigError::Read { .. })));
    }
}
