// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Labels carried in `MonitorEvent::source`.
pub mod sources {
    pub const DEVICE_MONITOR: &str = "DEVICE_MONITOR";
    pub const FS_MONITOR: &str = "FS_MONITOR";
}

/// Conventional keys used in `MonitorEvent::details`.
pub mod detail_keys {
    pub const ID: &str = "id";
    pub const VID: &str = "vid";
    pub const PID: &str = "pid";
    pub const SERIAL: &str = "serial";
    pub const CLASS_CODE: &str = "class_code";
    pub const CLASS_NAME: &str = "class_name";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const FILE_PATH: &str = "FilePath";
    pub const ACTION: &str = "Action";
    pub const PROCESS_ID: &str = "ProcessID";
    pub const PROCESS_NAME: &str = "ProcessName";
    pub const PROCESS_USER: &str = "ProcessUser";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    DeviceAdd,
    DeviceRemove,
    FileWrite,
    FileCreate,
    FileDelete,
    FileRename,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::DeviceAdd,
        EventKind::DeviceRemove,
        EventKind::FileWrite,
        EventKind::FileCreate,
        EventKind::FileDelete,
        EventKind::FileRename,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::DeviceAdd => "DEVICE_ADD",
            EventKind::DeviceRemove => "DEVICE_REMOVE",
            EventKind::FileWrite => "FILE_WRITE",
            EventKind::FileCreate => "FILE_CREATE",
            EventKind::FileDelete => "FILE_DELETE",
            EventKind::FileRename => "FILE_RENAME",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation produced by a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Instant the activity was detected
    pub timestamp: DateTime<Local>,

    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Producing monitor, see [`sources`]
    pub source: String,

    /// Human-readable summary
    pub message: String,

    /// Free-form attributes; keys vary by event kind
    pub details: BTreeMap<String, String>,
}

impl MonitorEvent {
    /// Build an event stamped with the current local time.
    pub fn now(
        kind: EventKind,
        source: impl Into<String>,
        message: impl Into<String>,
        details: BTreeMap<String, String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            kind,
            source: source.into(),
            message: message.into(),
            details,
        }
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_wire_format() {
        for kind in EventKind::ALL {
            let json = serde_json::to_string(&kind).expect("serialize kind");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn event_serializes_kind_under_type_key() {
        let mut details = BTreeMap::new();
        details.insert(detail_keys::ID.to_string(), "1-2".to_string());
        let event = MonitorEvent::now(
            EventKind::DeviceRemove,
            sources::DEVICE_MONITOR,
            "USB Device Removed: 1-2",
            details,
        );

        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["type"], "DEVICE_REMOVE");
        assert_eq!(value["source"], "DEVICE_MONITOR");
        assert_eq!(value["details"]["id"], "1-2");
        assert_eq!(event.detail(detail_keys::ID), Some("1-2"));
        assert_eq!(event.detail(detail_keys::VID), None);
    }
}
