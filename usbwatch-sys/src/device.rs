// SPDX-License-Identifier: GPL-3.0-only

//! Device presence monitor
//!
//! Polls the device registry on a fixed interval and reports the difference
//! between successive snapshots. Detection latency is bounded by the poll
//! interval.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, warn};

use usbwatch_contracts::{EventStream, Monitor, MonitorError, MonitorState, event_channel};
use usbwatch_types::{DeviceAttributes, EventKind, MonitorEvent, detail_keys, sources};

use crate::emit::emit;
use crate::registry::{DEFAULT_REGISTRY_ROOT, DeviceRegistry};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Identities that appeared and disappeared between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff_snapshots(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> SnapshotDiff {
    SnapshotDiff {
        added: current.difference(previous).cloned().collect(),
        removed: previous.difference(current).cloned().collect(),
    }
}

/// Owns the last known device set and turns registry changes into events.
#[derive(Debug)]
pub struct PresenceTracker {
    registry: DeviceRegistry,
    current: BTreeSet<String>,
}

impl PresenceTracker {
    /// Take the initial snapshot. An unreadable registry counts as no devices.
    pub fn new(registry: DeviceRegistry) -> Self {
        let current = match registry.snapshot() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(
                    "Device registry {} unreadable at startup, assuming no devices: {}",
                    registry.root().display(),
                    e
                );
                BTreeSet::new()
            }
        };

        Self { registry, current }
    }

    pub fn devices(&self) -> &BTreeSet<String> {
        &self.current
    }

    /// Re-read the registry and return add events followed by remove events.
    ///
    /// A failed read skips the tick: nothing is emitted and the known set is kept.
    pub fn poll(&mut self) -> Vec<MonitorEvent> {
        let next = match self.registry.snapshot() {
            Ok(devices) => devices,
            Err(e) => {
                debug!(
                    "Skipping poll, registry {} unreadable: {}",
                    self.registry.root().display(),
                    e
                );
                return Vec::new();
            }
        };

        let diff = diff_snapshots(&self.current, &next);
        let mut events = Vec::with_capacity(diff.added.len() + diff.removed.len());

        for id in &diff.added {
            let attributes = self.registry.read_attributes(id);
            info!("USB device attached: {} ({}:{})", id, attributes.vid, attributes.pid);
            events.push(device_added_event(id, attributes));
        }

        for id in &diff.removed {
            info!("USB device detached: {}", id);
            events.push(device_removed_event(id));
        }

        self.current = next;
        events
    }
}

fn device_added_event(id: &str, attributes: DeviceAttributes) -> MonitorEvent {
    let message = format!(
        "Device Added: {} ({}:{})",
        attributes.product_name, attributes.vid, attributes.pid
    );

    MonitorEvent::now(
        EventKind::DeviceAdd,
        sources::DEVICE_MONITOR,
        message,
        attributes.into_details(id),
    )
}

/// The device is already gone, so only its identity is reported.
fn device_removed_event(id: &str) -> MonitorEvent {
    MonitorEvent::now(
        EventKind::DeviceRemove,
        sources::DEVICE_MONITOR,
        format!("USB Device Removed: {id}"),
        BTreeMap::from([(detail_keys::ID.to_string(), id.to_string())]),
    )
}

#[derive(Debug, Clone)]
pub struct DeviceMonitorConfig {
    pub registry_root: PathBuf,
    pub poll_interval: Duration,
}

impl Default for DeviceMonitorConfig {
    fn default() -> Self {
        Self {
            registry_root: PathBuf::from(DEFAULT_REGISTRY_ROOT),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct DeviceMonitor {
    config: DeviceMonitorConfig,
    state: MonitorState,
    cancel: CancellationToken,
    span: Span,
}

impl DeviceMonitor {
    pub fn new(config: DeviceMonitorConfig) -> Self {
        let span = tracing::info_span!(
            "device_monitor",
            registry = %config.registry_root.display()
        );

        Self {
            config,
            state: MonitorState::Created,
            cancel: CancellationToken::new(),
            span,
        }
    }

    /// Replace the span the background task logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }
}

#[async_trait]
impl Monitor for DeviceMonitor {
    fn name(&self) -> &str {
        "device"
    }

    async fn start(&mut self) -> Result<EventStream, MonitorError> {
        self.state.ensure_startable(self.name())?;

        let tracker = self.span.in_scope(|| {
            let tracker = PresenceTracker::new(DeviceRegistry::new(&self.config.registry_root));
            info!(
                "Device monitor started with {} device(s) present, polling every {:?}",
                tracker.devices().len(),
                self.config.poll_interval
            );
            tracker
        });

        let (sender, receiver) = event_channel();
        tokio::spawn(
            run_presence_loop(
                tracker,
                self.config.poll_interval,
                sender,
                self.cancel.clone(),
            )
            .instrument(self.span.clone()),
        );

        self.state = MonitorState::Running;
        Ok(receiver)
    }

    fn stop(&mut self) {
        if self.state.stop() {
            self.cancel.cancel();
        } else {
            self.span.in_scope(|| debug!("Stop requested for a device monitor that is not running"));
        }
    }
}

async fn run_presence_loop(
    mut tracker: PresenceTracker,
    poll_interval: Duration,
    sender: mpsc::Sender<MonitorEvent>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'poll: loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for event in tracker.poll() {
                    if !emit(&sender, event, &cancel).await {
                        break 'poll;
                    }
                }
            }
        }
    }

    info!("Device monitor stopped");
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::registry::tests::add_device;
    use crate::test_support::TempDir;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn diff_reports_set_differences_only() {
        let diff = diff_snapshots(&set(&["1-1", "1-2", "2-1"]), &set(&["1-2", "2-1", "3-1"]));
        assert_eq!(diff.added, vec!["3-1".to_string()]);
        assert_eq!(diff.removed, vec!["1-1".to_string()]);

        let unchanged = diff_snapshots(&set(&["1-1"]), &set(&["1-1"]));
        assert!(unchanged.is_empty());
    }

    #[test]
    fn diff_holds_over_sampled_snapshot_pairs() {
        let universe = ["1-1", "1-2", "1-3", "2-1", "2-2", "3-1"];

        for before_mask in 0u32..64 {
            for after_mask in 0u32..64 {
                let pick = |mask: u32| -> BTreeSet<String> {
                    universe
                        .iter()
                        .enumerate()
                        .filter(|(index, _)| mask & (1 << index) != 0)
                        .map(|(_, name)| name.to_string())
                        .collect()
                };
                let before = pick(before_mask);
                let after = pick(after_mask);

                let diff = diff_snapshots(&before, &after);
                let added: BTreeSet<String> = diff.added.iter().cloned().collect();
                let removed: BTreeSet<String> = diff.removed.iter().cloned().collect();

                assert_eq!(added.len(), diff.added.len());
                assert_eq!(removed.len(), diff.removed.len());
                assert_eq!(added, after.difference(&before).cloned().collect());
                assert_eq!(removed, before.difference(&after).cloned().collect());
            }
        }
    }

    #[test]
    fn new_device_produces_one_enriched_add() {
        let temp = TempDir::new("presence-add");
        add_device(&temp.path, "1-1", &[("idVendor", "046d")]);
        let mut tracker = PresenceTracker::new(DeviceRegistry::new(&temp.path));

        add_device(
            &temp.path,
            "1-2",
            &[
                ("idVendor", "0781"),
                ("idProduct", "5567"),
                ("serial", "ABC123"),
                ("bDeviceClass", "08"),
                ("product", "Cruzer Blade"),
            ],
        );
        fs::create_dir_all(temp.join("1-2:1.0")).expect("create interface");

        let events = tracker.poll();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.kind, EventKind::DeviceAdd);
        assert_eq!(event.source, sources::DEVICE_MONITOR);
        assert_eq!(event.message, "Device Added: Cruzer Blade (0781:5567)");
        assert_eq!(event.detail("id"), Some("1-2"));
        assert_eq!(event.detail("serial"), Some("ABC123"));
        assert_eq!(event.detail("class_name"), Some("Mass Storage"));

        assert!(tracker.poll().is_empty());
    }

    #[test]
    fn removed_devices_carry_identity_only() {
        let temp = TempDir::new("presence-remove");
        add_device(&temp.path, "1-1", &[("idVendor", "046d"), ("product", "Mouse")]);
        add_device(&temp.path, "1-2", &[("idVendor", "0781")]);
        let mut tracker = PresenceTracker::new(DeviceRegistry::new(&temp.path));

        fs::remove_dir_all(temp.join("1-1")).expect("remove 1-1");
        fs::remove_dir_all(temp.join("1-2")).expect("remove 1-2");

        let events = tracker.poll();
        assert_eq!(events.len(), 2);
        for (event, id) in events.iter().zip(["1-1", "1-2"]) {
            assert_eq!(event.kind, EventKind::DeviceRemove);
            assert_eq!(event.message, format!("USB Device Removed: {id}"));
            assert_eq!(event.details.len(), 1);
            assert_eq!(event.detail("id"), Some(id));
        }
        assert!(tracker.devices().is_empty());
    }

    #[test]
    fn adds_are_emitted_before_removes_in_one_tick() {
        let temp = TempDir::new("presence-swap");
        add_device(&temp.path, "1-1", &[]);
        let mut tracker = PresenceTracker::new(DeviceRegistry::new(&temp.path));

        fs::remove_dir_all(temp.join("1-1")).expect("remove 1-1");
        add_device(&temp.path, "2-1", &[]);

        let kinds: Vec<EventKind> = tracker.poll().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::DeviceAdd, EventKind::DeviceRemove]);
    }

    #[test]
    fn unreadable_registry_skips_the_tick() {
        let temp = TempDir::new("presence-skip");
        let root = temp.join("devices");
        add_device(&root, "1-1", &[]);
        let mut tracker = PresenceTracker::new(DeviceRegistry::new(&root));

        let moved = temp.join("devices-away");
        fs::rename(&root, &moved).expect("hide registry");
        assert!(tracker.poll().is_empty());
        assert_eq!(tracker.devices(), &set(&["1-1"]));

        fs::rename(&moved, &root).expect("restore registry");
        assert!(tracker.poll().is_empty());
    }

    #[test]
    fn missing_registry_at_startup_is_an_empty_set() {
        let temp = TempDir::new("presence-missing");
        let root = temp.join("devices");
        let mut tracker = PresenceTracker::new(DeviceRegistry::new(&root));
        assert!(tracker.devices().is_empty());

        add_device(&root, "1-4", &[]);
        let events = tracker.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].detail("id"), Some("1-4"));
        assert_eq!(events[0].detail("vid"), Some("N/A"));
    }

    #[tokio::test]
    async fn monitor_streams_changes_and_closes_on_stop() {
        let temp = TempDir::new("presence-monitor");
        add_device(&temp.path, "1-1", &[]);

        let mut monitor = DeviceMonitor::new(DeviceMonitorConfig {
            registry_root: temp.path.clone(),
            poll_interval: Duration::from_millis(20),
        });
        let mut stream = monitor.start().await.expect("start device monitor");
        assert_eq!(monitor.state(), MonitorState::Running);

        add_device(&temp.path, "1-2", &[("product", "Stick")]);
        let event = tokio::time::timeout(Duration::from_secs(5), stream.recv())
            .await
            .expect("event within timeout")
            .expect("stream open");
        assert_eq!(event.kind, EventKind::DeviceAdd);
        assert_eq!(event.detail("id"), Some("1-2"));

        monitor.stop();
        monitor.stop();
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while stream.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok(), "stream should close after stop");
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn stopped_monitor_cannot_restart() {
        let temp = TempDir::new("presence-restart");
        let mut monitor = DeviceMonitor::new(DeviceMonitorConfig {
            registry_root: temp.path.clone(),
            poll_interval: Duration::from_millis(20),
        });

        let _stream = monitor.start().await.expect("first start");
        assert!(matches!(
            monitor.start().await,
            Err(MonitorError::InvalidState { .. })
        ));

        monitor.stop();
        assert!(matches!(
            monitor.start().await,
            Err(MonitorError::InvalidState { .. })
        ));
    }
}
