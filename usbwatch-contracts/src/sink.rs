// SPDX-License-Identifier: GPL-3.0-only

use usbwatch_types::MonitorEvent;

/// Downstream consumer of the aggregated event stream.
///
/// Called with one event at a time, in arrival order. A slow sink blocks the
/// aggregation loop, which in turn applies backpressure to the producers.
pub trait EventSink: Send {
    fn consume(&mut self, event: MonitorEvent);
}

impl<F> EventSink for F
where
    F: FnMut(MonitorEvent) + Send,
{
    fn consume(&mut self, event: MonitorEvent) {
        self(event)
    }
}
