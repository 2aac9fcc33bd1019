// SPDX-License-Identifier: GPL-3.0-only

//! Linux event producers for usbwatch
//!
//! This crate implements the two monitors the service aggregates:
//! - `DeviceMonitor`: polls the sysfs USB device registry and diffs snapshots
//! - `FsMonitor`: watches a mount root through inotify and extends its watch
//!   set into freshly mounted volumes once the mount-wait probe succeeds
//!
//! Both implement `usbwatch_contracts::Monitor` and know nothing about how
//! their events are consumed.

mod emit;
pub mod device;
pub mod error;
pub mod fs;
pub mod probe;
pub mod registry;
pub mod watch_set;

pub use device::{DeviceMonitor, DeviceMonitorConfig, PresenceTracker, SnapshotDiff, diff_snapshots};
pub use error::{Result, SysError};
pub use fs::{FsEventProcessor, FsMonitor, FsMonitorConfig, RawOp};
pub use probe::MountProbe;
pub use registry::{DEFAULT_REGISTRY_ROOT, DeviceRegistry, is_physical_device};
pub use watch_set::{WatchBackend, WatchSet};

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(1);

    pub struct TempDir {
        pub path: PathBuf,
    }

    impl TempDir {
        pub fn new(label: &str) -> Self {
            let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "usbwatch-sys-{label}-{}-{unique}",
                std::process::id()
            ));
            fs::create_dir_all(&path).expect("create temp dir");
            Self { path }
        }

        pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
            self.path.join(relative)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
