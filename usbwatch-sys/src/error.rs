// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

/// Error types for the Linux producers
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mount check failed after {attempts} retries for path: {}", path.display())]
    MountTimeout { path: PathBuf, attempts: u32 },

    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for producer operations
pub type Result<T> = std::result::Result<T, SysError>;
