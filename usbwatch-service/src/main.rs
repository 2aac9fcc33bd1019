// SPDX-License-Identifier: GPL-3.0-only

//! usbwatch - removable-storage activity monitor
//!
//! Reports USB device attach/detach and file activity on mounted volumes as
//! one stream of timestamped events, printed to the console, emitted as JSON
//! lines, or handed to the log pipeline.

use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod engine;
mod logging;
mod sink;
mod watch_root;

use cli::Args;
use config::Config;
use engine::Engine;
use usbwatch_sys::{DeviceMonitor, FsMonitor};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply_to(&mut config);

    logging::init(&config);

    tracing::info!("Starting usbwatch v{}", env!("CARGO_PKG_VERSION"));

    let mut engine = Engine::new();

    if config.device.enabled {
        let device_config = config.device_monitor_config();
        tracing::info!(
            "Device registry: {} (every {:?})",
            device_config.registry_root.display(),
            device_config.poll_interval
        );
        let span = tracing::info_span!("monitor", kind = "device");
        engine.add_monitor(Box::new(DeviceMonitor::new(device_config).with_span(span)));
    }

    if config.fs.enabled {
        let root = watch_root::resolve(config.fs.watch_root.as_deref());
        tracing::info!("Watching mount point: {}", root.display());
        let span = tracing::info_span!("monitor", kind = "fs", root = %root.display());
        engine.add_monitor(Box::new(
            FsMonitor::new(config.fs_monitor_config(root)).with_span(span),
        ));
    }

    if engine.is_empty() {
        anyhow::bail!("Both monitors are disabled; nothing to do");
    }

    let sink = sink::for_format(config.output);

    // The engine only returns once every monitor stream has closed.
    tokio::select! {
        report = engine.run(sink) => {
            if report.monitors_started == 0 {
                anyhow::bail!("No monitor could be started");
            }
            tracing::info!(
                "All monitors finished ({} started, {} failed, {} events)",
                report.monitors_started,
                report.monitors_failed,
                report.events_delivered
            );
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received shutdown signal");
        }
    }

    tracing::info!("usbwatch shutting down");
    Ok(())
}
