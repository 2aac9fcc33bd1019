// SPDX-License-Identifier: GPL-3.0-only

//! Mount-wait probe
//!
//! A directory-create notification for a mount point usually arrives before
//! the filesystem is attached. Scanning right away hits permission errors or
//! an empty tree, so the path is stat'ed with a bounded retry first.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Result, SysError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountProbe {
    max_attempts: u32,
    retry_delay: Duration,
}

impl MountProbe {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Wait until `path` can be stat'ed; returns the attempt that succeeded.
    pub async fn wait_for_mount(&self, path: &Path, cancel: &CancellationToken) -> Result<u32> {
        self.wait_with(path, cancel, |path| std::fs::metadata(path).map(|_| ()))
            .await
    }

    /// Same as [`wait_for_mount`](Self::wait_for_mount) with a custom stat.
    ///
    /// Every failed attempt, the last one included, is followed by one delay.
    pub async fn wait_with<F>(
        &self,
        path: &Path,
        cancel: &CancellationToken,
        mut stat: F,
    ) -> Result<u32>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        for attempt in 1..=self.max_attempts {
            match stat(path) {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("{} became accessible on attempt {}", path.display(), attempt);
                    }
                    return Ok(attempt);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!("{} not present yet (attempt {})", path.display(), attempt);
                }
                // Permission errors are common while the mount is negotiated.
                Err(e) => {
                    debug!(
                        "{} not accessible yet (attempt {}): {}",
                        path.display(),
                        attempt,
                        e
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(SysError::Cancelled),
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        Err(SysError::MountTimeout {
            path: path.to_path_buf(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for MountProbe {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}
