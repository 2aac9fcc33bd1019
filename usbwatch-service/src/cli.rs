// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, LoggingLevel, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "usbwatch")]
#[command(about = "Report USB attach/detach and file activity on removable volumes")]
pub struct Args {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Mount root to watch (defaults to /media/<user> or /media)
    #[arg(long)]
    pub watch_root: Option<PathBuf>,

    /// USB device registry directory
    #[arg(long)]
    pub registry: Option<PathBuf>,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,

    #[arg(long, value_enum)]
    pub log_level: Option<LoggingLevel>,

    /// Also write logs to a daily rolling file
    #[arg(long)]
    pub log_to_disk: bool,

    #[arg(long)]
    pub no_device_monitor: bool,

    #[arg(long)]
    pub no_fs_monitor: bool,
}

impl Args {
    /// Command-line values win over the configuration file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(root) = &self.watch_root {
            config.fs.watch_root = Some(root.clone());
        }
        if let Some(registry) = &self.registry {
            config.device.registry_root = registry.clone();
        }
        if let Some(interval) = self.poll_interval_ms {
            config.device.poll_interval_ms = interval.max(1);
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if self.log_to_disk {
            config.log_to_disk = true;
        }
        if self.no_device_monitor {
            config.device.enabled = false;
        }
        if self.no_fs_monitor {
            config.fs.enabled = false;
        }
    }
}
