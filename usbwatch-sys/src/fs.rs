// SPDX-License-Identifier: GPL-3.0-only

//! Mount-aware filesystem monitor
//!
//! Watches every directory below a mount root (usually `/media/<user>`) and
//! reports file activity. When a directory appears, the mount-wait probe
//! runs before anything else; once it succeeds the new subtree joins the
//! watch set, so a freshly mounted volume is covered without a restart.
//! Files that already existed before that registration produce no events.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind as NotifyKind, RecommendedWatcher, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, trace, warn};

use usbwatch_contracts::{EventStream, Monitor, MonitorError, MonitorState, event_channel};
use usbwatch_types::{EventKind, MonitorEvent, detail_keys, sources};

use crate::emit::emit;
use crate::error::SysError;
use crate::probe::MountProbe;
use crate::watch_set::{WatchBackend, WatchSet};

/// Raw operation carried by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOp {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

impl RawOp {
    /// Classify a notify event kind; access and unknown kinds are `None`.
    ///
    /// A rename arrives as `From` (old path), `To` (new path) and `Both`
    /// (both paths). The old path is the rename; the new path is treated as a
    /// creation so a directory moved into the tree is probed and watched.
    /// `Both` repeats the other two and is dropped.
    pub fn from_kind(kind: &NotifyKind) -> Option<Self> {
        match kind {
            NotifyKind::Create(_) => Some(RawOp::Create),
            NotifyKind::Remove(_) => Some(RawOp::Remove),
            NotifyKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(RawOp::Create),
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
            NotifyKind::Modify(ModifyKind::Name(_)) => Some(RawOp::Rename),
            NotifyKind::Modify(ModifyKind::Metadata(_)) => Some(RawOp::Chmod),
            NotifyKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
                Some(RawOp::Write)
            }
            NotifyKind::Access(_) | NotifyKind::Any | NotifyKind::Other => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RawOp::Create => "CREATE",
            RawOp::Write => "WRITE",
            RawOp::Remove => "REMOVE",
            RawOp::Rename => "RENAME",
            RawOp::Chmod => "CHMOD",
        }
    }

    /// Event kind reported for this operation; metadata changes report nothing.
    pub fn event_kind(self) -> Option<EventKind> {
        match self {
            RawOp::Create => Some(EventKind::FileCreate),
            RawOp::Write => Some(EventKind::FileWrite),
            RawOp::Remove => Some(EventKind::FileDelete),
            RawOp::Rename => Some(EventKind::FileRename),
            RawOp::Chmod => None,
        }
    }
}

/// Turns raw notifications into events and extends the watch set.
pub struct FsEventProcessor<B> {
    watch_set: WatchSet<B>,
    probe: MountProbe,
}

impl<B: WatchBackend> FsEventProcessor<B> {
    pub fn new(watch_set: WatchSet<B>, probe: MountProbe) -> Self {
        Self { watch_set, probe }
    }

    pub fn watch_set(&self) -> &WatchSet<B> {
        &self.watch_set
    }

    pub fn watch_set_mut(&mut self) -> &mut WatchSet<B> {
        &mut self.watch_set
    }

    pub async fn process(
        &mut self,
        raw: notify::Event,
        cancel: &CancellationToken,
    ) -> Vec<MonitorEvent> {
        let Some(op) = RawOp::from_kind(&raw.kind) else {
            trace!("Ignoring unclassified notification {:?}", raw.kind);
            return Vec::new();
        };
        if op == RawOp::Chmod {
            return Vec::new();
        }

        let mut events = Vec::with_capacity(raw.paths.len());
        for path in raw.paths {
            if let Some(event) = self.process_path(op, path, cancel).await {
                events.push(event);
            }
        }
        events
    }

    async fn process_path(
        &mut self,
        op: RawOp,
        path: PathBuf,
        cancel: &CancellationToken,
    ) -> Option<MonitorEvent> {
        if op == RawOp::Create {
            match self.probe.wait_for_mount(&path, cancel).await {
                Ok(_) => {}
                Err(SysError::Cancelled) => return None,
                Err(e) => {
                    warn!("Skipped monitoring {}: {}", path.display(), e);
                    return None;
                }
            }

            if fs::symlink_metadata(&path).is_ok_and(|metadata| metadata.is_dir()) {
                info!("New mount/directory detected: {}", path.display());
                let added = self.watch_set.register_recursive(&path);
                debug!(
                    "Watching {} new director{} ({} total)",
                    added,
                    if added == 1 { "y" } else { "ies" },
                    self.watch_set.len()
                );
            }
        }

        let kind = op.event_kind()?;
        Some(file_event(kind, op, &path))
    }
}

fn file_event(kind: EventKind, op: RawOp, path: &Path) -> MonitorEvent {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    MonitorEvent::now(
        kind,
        sources::FS_MONITOR,
        format!("File activity: {name}"),
        BTreeMap::from([
            (detail_keys::FILE_PATH.to_string(), path.display().to_string()),
            (detail_keys::ACTION.to_string(), op.as_str().to_string()),
        ]),
    )
}

#[derive(Debug, Clone)]
pub struct FsMonitorConfig {
    pub watch_root: PathBuf,
    pub probe: MountProbe,
}

impl FsMonitorConfig {
    pub fn new(watch_root: impl Into<PathBuf>) -> Self {
        Self {
            watch_root: watch_root.into(),
            probe: MountProbe::default(),
        }
    }
}

pub struct FsMonitor {
    config: FsMonitorConfig,
    state: MonitorState,
    cancel: CancellationToken,
    span: Span,
}

impl FsMonitor {
    pub fn new(config: FsMonitorConfig) -> Self {
        let span = tracing::info_span!("fs_monitor", root = %config.watch_root.display());

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
impl Monitor for FsMonitor {
    fn name(&self) -> &str {
        "fs"
    }

    async fn start(&mut self) -> Result<EventStream, MonitorError> {
        self.state.ensure_startable(self.name())?;

        let (raw_sender, raw_receiver) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| {
                // The receiver only goes away once the producer has finished.
                let _ = raw_sender.send(result);
            },
            notify::Config::default(),
        )
        .map_err(|e| MonitorError::SourceUnavailable(e.to_string()))?;

        let mut processor = FsEventProcessor::new(WatchSet::new(watcher), self.config.probe);
        self.span.in_scope(|| {
            processor
                .watch_set_mut()
                .register_recursive(&self.config.watch_root);
            info!(
                "Filesystem monitor watching {} director{} under {}",
                processor.watch_set().len(),
                if processor.watch_set().len() == 1 { "y" } else { "ies" },
                self.config.watch_root.display()
            );
        });

        let (sender, receiver) = event_channel();
        tokio::spawn(
            run_fs_loop(processor, raw_receiver, sender, self.cancel.clone())
                .instrument(self.span.clone()),
        );

        self.state = MonitorState::Running;
        Ok(receiver)
    }

    fn stop(&mut self) {
        if self.state.stop() {
            self.cancel.cancel();
        } else {
            self.span
                .in_scope(|| debug!("Stop requested for a filesystem monitor that is not running"));
        }
    }
}

/// Dropping the processor on exit closes the watcher and its kernel handle.
async fn run_fs_loop<B: WatchBackend>(
    mut processor: FsEventProcessor<B>,
    mut raw_receiver: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    sender: mpsc::Sender<MonitorEvent>,
    cancel: CancellationToken,
) {
    'watch: loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            raw = raw_receiver.recv() => raw,
        };

        match raw {
            None => break,
            Some(Ok(notification)) => {
                for event in processor.process(notification, &cancel).await {
                    if !emit(&sender, event, &cancel).await {
                        break 'watch;
                    }
                }
            }
            Some(Err(e)) => {
                error!("FS monitor error: {}", e);
            }
        }
    }

    info!("Filesystem monitor stopped");
}
