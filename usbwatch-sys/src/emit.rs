// SPDX-License-Identifier: GPL-3.0-only

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use usbwatch_types::MonitorEvent;

/// Send one event unless the monitor is stopped first.
///
/// Returns false when the producer loop should end, either because `stop`
/// was requested or because nobody is reading the stream any more.
pub(crate) async fn emit(
    sender: &mpsc::Sender<MonitorEvent>,
    event: MonitorEvent,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        result = sender.send(event) => {
            if result.is_err() {
                debug!("Event stream receiver dropped");
            }
            result.is_ok()
        }
    }
}
