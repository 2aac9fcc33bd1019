// SPDX-License-Identifier: GPL-3.0-only

//! Downstream consumers for the aggregated event stream

use std::io::{self, Write};

use tracing::warn;

use usbwatch_contracts::EventSink;
use usbwatch_types::{MonitorEvent, detail_keys};

use crate::config::OutputFormat;

const SEPARATOR: &str = "------------------------------------------------";

pub fn for_format(format: OutputFormat) -> Box<dyn EventSink> {
    match format {
        OutputFormat::Console => Box::new(ConsoleSink::new(io::stdout())),
        OutputFormat::Json => Box::new(JsonSink::new(io::stdout())),
        OutputFormat::Log => Box::new(TracingSink),
    }
}

/// Human-readable block per event.
pub struct ConsoleSink<W> {
    writer: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn render(&mut self, event: &MonitorEvent) -> io::Result<()> {
        let out = &mut self.writer;
        writeln!(out, "{SEPARATOR}")?;
        writeln!(
            out,
            "[{}] EVENT: {}",
            event.timestamp.format("%H:%M:%S"),
            event.kind
        )?;
        writeln!(out, "   Source: {}", event.source)?;
        writeln!(out, "   Message: {}", event.message)?;

        if let Some(pid) = event.detail(detail_keys::PROCESS_ID) {
            writeln!(
                out,
                "   >> Process: {} (PID {}) by User: {}",
                event.detail(detail_keys::PROCESS_NAME).unwrap_or_default(),
                pid,
                event.detail(detail_keys::PROCESS_USER).unwrap_or_default()
            )?;
        }

        if let Some(path) = event.detail(detail_keys::FILE_PATH) {
            writeln!(out, "   >> File Affected: {path}")?;
        }

        writeln!(out, "{SEPARATOR}")?;
        out.flush()
    }
}

impl<W: Write + Send> EventSink for ConsoleSink<W> {
    fn consume(&mut self, event: MonitorEvent) {
        if let Err(e) = self.render(&event) {
            warn!("Failed to write event to console: {}", e);
        }
    }
}

/// Newline-delimited JSON, one object per event.
pub struct JsonSink<W> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_line(&mut self, event: &MonitorEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }
}

impl<W: Write + Send> EventSink for JsonSink<W> {
    fn consume(&mut self, event: MonitorEvent) {
        if let Err(e) = self.write_line(&event) {
            warn!("Failed to write event as JSON: {}", e);
        }
    }
}

/// Hands events to the tracing pipeline as structured records.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn consume(&mut self, event: MonitorEvent) {
        let details = serde_json::to_string(&event.details).unwrap_or_default();
        tracing::info!(
            target: "usbwatch::events",
            kind = %event.kind,
            source = %event.source,
            timestamp = %event.timestamp.to_rfc3339(),
            details = %details,
            "{}",
            event.message
        );
    }
}
