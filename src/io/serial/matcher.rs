// src/io/serial/matcher.rs
//
// Decides whether one of the attached devices is the robot controller, by
// USB (vendor, product) identity against an allow-list from settings.

use serde::{Deserialize, Serialize};

use super::transport::SerialDeviceDescriptor;

/// An allow-listed controller or USB-serial adapter identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Human-readable note, only used in logs
    #[serde(default)]
    pub label: String,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, product_id: u16, label: &str) -> Self {
        Self {
            vendor_id,
            product_id,
            label: label.to_string(),
        }
    }

    pub fn matches(&self, device: &SerialDeviceDescriptor) -> bool {
        self.vendor_id == device.vendor_id && self.product_id == device.product_id
    }
}

/// Boards the balancing sketch has been run on
pub fn default_allow_list() -> Vec<DeviceIdentity> {
    vec![
        DeviceIdentity::new(0x0403, 0x6001, "FTDI FT232R UART (OSEPP Micro)"),
        DeviceIdentity::new(0x10C4, 0xEA60, "CP210x UART Bridge (NodeMCU)"),
        DeviceIdentity::new(0x1FFB, 0x2300, "Pololu A-Star 32U4"),
        DeviceIdentity::new(0x2341, 0x0043, "Arduino Uno"),
    ]
}

#[derive(Clone, Debug)]
pub struct DeviceMatcher {
    allow_list: Vec<DeviceIdentity>,
}

impl DeviceMatcher {
    pub fn new(allow_list: Vec<DeviceIdentity>) -> Self {
        Self { allow_list }
    }

    pub fn allow_list(&self) -> &[DeviceIdentity] {
        &self.allow_list
    }

    /// Allow-list entry for a device, if any
    pub fn identify(&self, device: &SerialDeviceDescriptor) -> Option<&DeviceIdentity> {
        self.allow_list.iter().find(|id| id.matches(device))
    }

    /// Index of the first allow-listed device in enumeration order.
    ///
    /// With several candidates attached the earliest one wins, regardless of
    /// allow-list order.
    pub fn find_match(&self, devices: &[SerialDeviceDescriptor]) -> Option<usize> {
        devices.iter().position(|d| self.identify(d).is_some())
    }
}

impl Default for DeviceMatcher {
    fn default() -> Self {
        Self::new(default_allow_list())
    }
}
