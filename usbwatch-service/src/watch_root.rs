// SPDX-License-Identifier: GPL-3.0-only

//! Pick the mount root the filesystem monitor watches

use std::path::{Path, PathBuf};

use nix::unistd::{User, getuid};
use tracing::{debug, warn};

const MEDIA_ROOT: &str = "/media";

/// An explicit root wins; otherwise desktop automounters use `/media/<user>`.
pub fn resolve(configured: Option<&Path>) -> PathBuf {
    if let Some(root) = configured {
        return root.to_path_buf();
    }

    let username = current_username();
    default_root(Path::new(MEDIA_ROOT), username.as_deref(), |path| path.exists())
}

fn current_username() -> Option<String> {
    match User::from_uid(getuid()) {
        Ok(Some(user)) => Some(user.name),
        Ok(None) => {
            debug!("No passwd entry for uid {}", getuid());
            None
        }
        Err(e) => {
            warn!("Failed to resolve current user: {}", e);
            None
        }
    }
}

/// Root watches the whole media directory, as does an unknown user.
fn default_root(media: &Path, username: Option<&str>, exists: impl Fn(&Path) -> bool) -> PathBuf {
    match username {
        Some(name) if name != "root" => {
            let per_user = media.join(name);
            if exists(&per_user) {
                per_user
            } else {
                debug!(
                    "{} does not exist, falling back to {}",
                    per_user.display(),
                    media.display()
                );
                media.to_path_buf()
            }
        }
        _ => media.to_path_buf(),
    }
}
