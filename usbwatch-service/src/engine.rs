// SPDX-License-Identifier: GPL-3.0-only

//! Fan-in of every monitor's stream into one consumer
//!
//! Each started monitor gets a forwarding task that relays its stream into a
//! shared channel; a single consumer task drains that channel into the sink.
//! Events from one monitor keep their order, events from different monitors
//! interleave in arrival order.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use usbwatch_contracts::{EventSink, EventStream, Monitor, event_channel};
use usbwatch_types::MonitorEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineReport {
    pub monitors_started: usize,
    pub monitors_failed: usize,
    pub events_delivered: u64,
}

#[derive(Default)]
pub struct Engine {
    monitors: Vec<Box<dyn Monitor>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.monitors.push(monitor);
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Start every monitor and deliver their events to `sink`.
    ///
    /// A monitor that fails to start is logged and left out. Returns once
    /// every started monitor's stream has closed and the sink has seen every
    /// forwarded event.
    pub async fn run(self, sink: Box<dyn EventSink>) -> EngineReport {
        info!("Starting event engine with {} monitor(s)", self.monitors.len());

        let mut report = EngineReport::default();
        let (aggregate_sender, aggregate_receiver) = event_channel();
        let mut forwarders = JoinSet::new();
        let mut running = Vec::with_capacity(self.monitors.len());

        for mut monitor in self.monitors {
            match monitor.start().await {
                Ok(stream) => {
                    info!("Monitor {} started", monitor.name());
                    report.monitors_started += 1;
                    forwarders.spawn(forward(
                        monitor.name().to_string(),
                        stream,
                        aggregate_sender.clone(),
                    ));
                    running.push(monitor);
                }
                Err(e) => {
                    error!("Failed to start monitor {}: {}", monitor.name(), e);
                    report.monitors_failed += 1;
                }
            }
        }

        if report.monitors_started == 0 {
            error!("No monitor could be started; nothing to aggregate");
        }

        // Only the forwarders hold senders from here on.
        drop(aggregate_sender);
        let consumer = tokio::spawn(consume(aggregate_receiver, sink));

        while let Some(result) = forwarders.join_next().await {
            if let Err(e) = result {
                error!("Forwarding task failed: {}", e);
            }
        }
        debug!("All monitor streams closed");

        report.events_delivered = match consumer.await {
            Ok(delivered) => delivered,
            Err(e) => {
                error!("Event consumer task failed: {}", e);
                0
            }
        };

        drop(running);
        info!(
            "Event engine finished: {} event(s) delivered",
            report.events_delivered
        );
        report
    }
}

async fn forward(name: String, mut stream: EventStream, aggregate: mpsc::Sender<MonitorEvent>) {
    while let Some(event) = stream.recv().await {
        if aggregate.send(event).await.is_err() {
            warn!("Aggregation channel closed, dropping stream of monitor {}", name);
            return;
        }
    }
    debug!("Stream of monitor {} closed", name);
}

async fn consume(mut aggregate: mpsc::Receiver<MonitorEvent>, mut sink: Box<dyn EventSink>) -> u64 {
    let mut delivered = 0;
    while let Some(event) = aggregate.recv().await {
        sink.consume(event);
        delivered += 1;
    }
    delivered
}
