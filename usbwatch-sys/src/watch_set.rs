// SPDX-License-Identifier: GPL-3.0-only

//! Directories registered for change notification
//!
//! The set only grows. Deleted directories stay registered; the kernel drops
//! their watches on its own.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode};
use tracing::{debug, error};

/// Something directories can be registered with.
pub trait WatchBackend: Send {
    fn watch(&mut self, path: &Path) -> notify::Result<()>;
}

impl WatchBackend for RecommendedWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        notify::Watcher::watch(self, path, RecursiveMode::NonRecursive)
    }
}

pub struct WatchSet<B> {
    backend: B,
    watched: BTreeSet<PathBuf>,
}

impl<B: WatchBackend> WatchSet<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            watched: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }

    /// Register `root` and every directory below it; returns how many were new.
    ///
    /// Symlinks are not followed. A directory that cannot be registered or
    /// listed is logged and skipped without aborting the walk.
    pub fn register_recursive(&mut self, root: &Path) -> usize {
        match fs::symlink_metadata(root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                error!("Error walking path {}: not a directory", root.display());
                return 0;
            }
            Err(e) => {
                error!("Error walking path {}: {}", root.display(), e);
                return 0;
            }
        }

        let mut added = 0;
        let mut stack = vec![root.to_path_buf()];

        while let Some(directory) = stack.pop() {
            if self.register(&directory) {
                added += 1;
            }

            let entries = match fs::read_dir(&directory) {
                Ok(entries) => entries,
                Err(e) => {
                    error!("Failed to list directory {}: {}", directory.display(), e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if file_type.is_dir() {
                    stack.push(entry.path());
                }
            }
        }

        added
    }

    fn register(&mut self, directory: &Path) -> bool {
        if self.watched.contains(directory) {
            return false;
        }

        match self.backend.watch(directory) {
            Ok(()) => {
                debug!("Started watching: {}", directory.display());
                self.watched.insert(directory.to_path_buf());
                true
            }
            Err(e) => {
                error!("Failed to watch directory: {}, error: {}", directory.display(), e);
                false
            }
        }
    }
}
