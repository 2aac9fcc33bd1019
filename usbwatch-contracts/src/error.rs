// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use crate::monitor::MonitorState;

/// Reasons a monitor could not be started.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor {monitor} cannot start from state {state:?}")]
    InvalidState {
        monitor: String,
        state: MonitorState,
    },

    #[error("notification source unavailable: {0}")]
    SourceUnavailable(String),
}
