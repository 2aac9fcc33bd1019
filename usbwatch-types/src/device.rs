// SPDX-License-Identifier: GPL-3.0-only

//! Device attribute model read from the USB device registry

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::detail_keys;

/// Placeholder for any attribute that could not be read.
pub const NOT_AVAILABLE: &str = "N/A";

/// Human label for the `bDeviceClass` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    MassStorage,
    HumanInterface,
    Other,
}

impl DeviceClass {
    /// Map a two-digit hex class code; unknown codes fall to `Other`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "08" => DeviceClass::MassStorage,
            "03" => DeviceClass::HumanInterface,
            _ => DeviceClass::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeviceClass::MassStorage => "Mass Storage",
            DeviceClass::HumanInterface => "Human Interface Device (HID)",
            DeviceClass::Other => "Other",
        }
    }
}

/// Attributes of a freshly attached device.
///
/// Read once when the device is first seen and never retained after removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    pub vid: String,
    pub pid: String,
    pub serial: String,
    pub class_code: String,
    pub product_name: String,
}

impl DeviceAttributes {
    pub fn class(&self) -> DeviceClass {
        DeviceClass::from_code(&self.class_code)
    }

    /// Flatten into event details, including the registry identity.
    pub fn into_details(self, id: &str) -> BTreeMap<String, String> {
        let class_name = self.class().label().to_string();

        BTreeMap::from([
            (detail_keys::ID.to_string(), id.to_string()),
            (detail_keys::VID.to_string(), self.vid),
            (detail_keys::PID.to_string(), self.pid),
            (detail_keys::SERIAL.to_string(), self.serial),
            (detail_keys::CLASS_CODE.to_string(), self.class_code),
            (detail_keys::CLASS_NAME.to_string(), class_name),
            (detail_keys::PRODUCT_NAME.to_string(), self.product_name),
        ])
    }
}

impl Default for DeviceAttributes {
    fn default() -> Self {
        Self {
            vid: NOT_AVAILABLE.to_string(),
            pid: NOT_AVAILABLE.to_string(),
            serial: NOT_AVAILABLE.to_string(),
            class_code: NOT_AVAILABLE.to_string(),
            product_name: NOT_AVAILABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_lookup_falls_back_to_other() {
        assert_eq!(DeviceClass::from_code("08").label(), "Mass Storage");
        assert_eq!(
            DeviceClass::from_code("03").label(),
            "Human Interface Device (HID)"
        );
        assert_eq!(DeviceClass::from_code("09"), DeviceClass::Other);
        assert_eq!(DeviceClass::from_code(NOT_AVAILABLE), DeviceClass::Other);
        assert_eq!(DeviceClass::from_code(""), DeviceClass::Other);
    }

    #[test]
    fn details_carry_identity_and_class_name() {
        let attributes = DeviceAttributes {
            vid: "0781".to_string(),
            pid: "5567".to_string(),
            serial: "4C530001".to_string(),
            class_code: "08".to_string(),
            product_name: "Cruzer Blade".to_string(),
        };

        let details = attributes.into_details("1-1");
        assert_eq!(details["id"], "1-1");
        assert_eq!(details["vid"], "0781");
        assert_eq!(details["class_name"], "Mass Storage");
        assert_eq!(details.len(), 7);
    }

    #[test]
    fn default_attributes_are_placeholders() {
        let details = DeviceAttributes::default().into_details("2-1");
        assert_eq!(details["serial"], NOT_AVAILABLE);
        assert_eq!(details["class_name"], "Other");
    }
}
