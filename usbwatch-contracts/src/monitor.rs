// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use tokio::sync::mpsc;

use usbwatch_types::MonitorEvent;

use crate::MonitorError;

/// Receiving half of a monitor's output channel.
///
/// The stream closes once the monitor's background producer has finished.
pub type EventStream = mpsc::Receiver<MonitorEvent>;

/// Create a producer channel with the smallest buffer tokio allows, so a
/// slow consumer stalls the producer that is trying to emit.
pub fn event_channel() -> (mpsc::Sender<MonitorEvent>, EventStream) {
    mpsc::channel(1)
}

/// An independent producer of [`MonitorEvent`]s.
///
/// `start` performs its setup before returning and hands back a stream that
/// is already being fed by a background task. `stop` asks that task to end;
/// the stream then closes promptly.
#[async_trait]
pub trait Monitor: Send {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<EventStream, MonitorError>;

    fn stop(&mut self);
}

/// Lifecycle of a single monitor instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonitorState {
    #[default]
    Created,
    Running,
    Stopped,
}

impl MonitorState {
    /// Only a freshly constructed monitor may start; a stopped one is spent.
    pub fn ensure_startable(self, monitor: &str) -> Result<(), MonitorError> {
        match self {
            MonitorState::Created => Ok(()),
            state => Err(MonitorError::InvalidState {
                monitor: monitor.to_string(),
                state,
            }),
        }
    }

    /// Move to `Stopped`; returns false when there was nothing running.
    pub fn stop(&mut self) -> bool {
        let was_running = *self == MonitorState::Running;
        if *self != MonitorState::Created {
            *self = MonitorState::Stopped;
        }
        was_running
    }
}
