// src/io/serial/mod.rs
//
// Serial driver for the controller link.
//
// - transport: OS enumeration and open (serialport), behind a trait for tests
// - matcher: allow-list of controller USB identities
// - link: one open connection, frame writes and the background read loop

pub mod link;
pub mod matcher;
pub mod transport;
pub(crate) mod utils;

#[cfg(test)]
pub(crate) mod mock;

pub use link::{SerialConfig, SerialLink};
pub use matcher::{default_allow_list, DeviceIdentity, DeviceMatcher};
pub use transport::{OpenedPort, PortReader, PortWriter, SerialDeviceDescriptor, SystemTransport, Transport};
pub use utils::Parity;
