// SPDX-License-Identifier: GPL-3.0-only

//! Canonical event model for usbwatch
//!
//! Every producer in the workspace speaks these types:
//!
//! - **usbwatch-sys**: builds `MonitorEvent` values from device registry
//!   snapshots and filesystem notifications
//! - **usbwatch-service**: fans them into one stream and hands them to a sink
//!
//! Events are plain data. They are created once by a monitor and moved by
//! value through channels to exactly one consumer.

pub mod device;
pub mod event;

pub use device::{DeviceAttributes, DeviceClass, NOT_AVAILABLE};
pub use event::{EventKind, MonitorEvent, detail_keys, sources};
