// SPDX-License-Identifier: GPL-3.0-only

//! Read-only view of the sysfs USB device registry

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;
use usbwatch_types::{DeviceAttributes, NOT_AVAILABLE};

use crate::error::Result;

pub const DEFAULT_REGISTRY_ROOT: &str = "/sys/bus/usb/devices";

/// Root hubs are listed as `usb1`, `usb2`, ...
const BUS_PREFIX: &str = "usb";

/// Interfaces (`2-1:1.0`) and buses are not physical devices.
pub fn is_physical_device(name: &str) -> bool {
    !name.contains(':') && !name.starts_with(BUS_PREFIX)
}

#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    root: PathBuf,
}

impl DeviceRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the physical device nodes currently listed.
    pub fn snapshot(&self) -> Result<BTreeSet<String>> {
        let mut devices = BTreeSet::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };

            if is_physical_device(&name) {
                devices.insert(name);
            }
        }

        Ok(devices)
    }

    /// Read the descriptor attributes of one device; missing files read as `N/A`.
    pub fn read_attributes(&self, id: &str) -> DeviceAttributes {
        let device_path = self.root.join(id);

        DeviceAttributes {
            vid: read_attribute(&device_path.join("idVendor")),
            pid: read_attribute(&device_path.join("idProduct")),
            serial: read_attribute(&device_path.join("serial")),
            class_code: read_attribute(&device_path.join("bDeviceClass")),
            product_name: read_attribute(&device_path.join("product")),
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_ROOT)
    }
}

fn read_attribute(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content.trim().to_string(),
        Err(e) => {
            trace!("Failed to read device attribute {}: {}", path.display(), e);
            NOT_AVAILABLE.to_string()
        }
    }
}
