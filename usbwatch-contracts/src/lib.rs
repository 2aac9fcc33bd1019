// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod monitor;
pub mod sink;

pub use error::MonitorError;
pub use monitor::{EventStream, Monitor, MonitorState, event_channel};
pub use sink::EventSink;
