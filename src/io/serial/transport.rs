// src/io/serial/transport.rs
//
// The seam between the bridge and the OS serial stack.
//
// A Transport enumerates attached USB serial devices and opens one of them as a
// writer/reader pair. The reader is a separate handle (try_clone) so the read
// loop never contends with telemetry writes for a lock. SystemTransport is the
// serialport-backed implementation; tests use io::serial::mock.

use serde::Serialize;
use std::io::{Read, Write};

use super::link::SerialConfig;
use super::utils::{to_serialport_data_bits, to_serialport_parity, to_serialport_stop_bits};
use crate::io::error::{IoError, OpenError};

// ============================================================================
// Types
// ============================================================================

/// An attached USB serial device.
///
/// The full set is re-enumerated on every attach/detach notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SerialDeviceDescriptor {
    /// OS port path, e.g. /dev/ttyACM0 or COM4
    pub port_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

impl SerialDeviceDescriptor {
    /// `"<manufacturer> : <product>"` as shown in the device list
    pub fn display_line(&self) -> String {
        format!(
            "{} : {}",
            self.manufacturer.as_deref().unwrap_or(""),
            self.product.as_deref().unwrap_or("")
        )
    }

    /// `VID:PID` in the lsusb style, for logs
    pub fn usb_id(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Write half of an open port
pub trait PortWriter: Send {
    /// Single write of a whole frame, bounded by the port's write timeout
    fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Drive the "device ready" control line (DTR)
    fn set_ready_line(&mut self, asserted: bool) -> std::io::Result<()>;
}

/// Read half of an open port
pub trait PortReader: Send {
    /// Read whatever is available. `Err(TimedOut)` means nothing arrived within
    /// the poll interval and is not a failure.
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Handles produced by a successful open
pub struct OpenedPort {
    pub writer: Box<dyn PortWriter>,
    pub reader: Box<dyn PortReader>,
}

pub trait Transport: Send + Sync {
    /// All currently attached USB serial devices, in enumeration order
    fn enumerate(&self) -> Result<Vec<SerialDeviceDescriptor>, IoError>;

    /// Claim and configure a device. Must not leave the port open on failure.
    fn open(&self, device: &SerialDeviceDescriptor, config: &SerialConfig) -> Result<OpenedPort, OpenError>;
}

// ============================================================================
// serialport-backed transport
// ============================================================================

/// Serial transport backed by the OS through the serialport crate
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTransport;

struct SystemWriter(Box<dyn serialport::SerialPort>);
struct SystemReader(Box<dyn serialport::SerialPort>);

/// Hand one frame to the driver.
///
/// serialport's write polls with the port timeout, so write_all is bounded by
/// it. No flush: on POSIX that is tcdrain, which has no deadline and never
/// returns if the peer stops reading.
fn write_bounded<W: Write + ?Sized>(port: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    port.write_all(bytes)
}

/// Timeout for the read half, if it can differ from the writer's.
///
/// On Windows a try_clone handle shares COMMTIMEOUTS with the original, so
/// changing it would also shorten the write timeout. There the reader keeps
/// the write timeout and the read loop polls at that interval instead.
fn reader_timeout(config: &SerialConfig) -> Option<std::time::Duration> {
    if cfg!(windows) {
        None
    } else {
        Some(config.read_poll)
    }
}

impl PortWriter for SystemWriter {
    fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        write_bounded(&mut *self.0, bytes)
    }

    fn set_ready_line(&mut self, asserted: bool) -> std::io::Result<()> {
        self.0.write_data_terminal_ready(asserted).map_err(std::io::Error::from)
    }
}

impl PortReader for SystemReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

fn open_error(device: &str, e: serialport::Error) -> OpenError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => OpenError::not_attached(device),
        serialport::ErrorKind::InvalidInput => OpenError::configuration(device, e.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            OpenError::permission_denied(device, e.to_string())
        }
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => OpenError::not_attached(device),
        serialport::ErrorKind::Io(std::io::ErrorKind::AddrInUse) => OpenError::busy(device, e.to_string()),
        _ => OpenError::io(device, e.to_string()),
    }
}

impl Transport for SystemTransport {
    /// On macOS, filters out /dev/tty.* devices and only keeps /dev/cu.* devices.
    /// The cu (calling unit) devices are non-blocking and preferred for outgoing connections.
    /// Non-USB ports carry no VID/PID and can never match the allow-list, so they are skipped.
    fn enumerate(&self) -> Result<Vec<SerialDeviceDescriptor>, IoError> {
        let ports = serialport::available_ports()
            .map_err(|e| IoError::connection("serial", format!("Failed to enumerate ports: {}", e)))?;

        Ok(ports
            .into_iter()
            .filter(|_p| {
                #[cfg(target_os = "macos")]
                {
                    !_p.port_name.starts_with("/dev/tty.")
                }
                #[cfg(not(target_os = "macos"))]
                {
                    true
                }
            })
            .filter_map(|p| match p.port_type {
                serialport::SerialPortType::UsbPort(info) => Some(SerialDeviceDescriptor {
                    port_name: p.port_name,
                    vendor_id: info.vid,
                    product_id: info.pid,
                    manufacturer: info.manufacturer,
                    product: info.product,
                    serial_number: info.serial_number,
                }),
                _ => None,
            })
            .collect())
    }

    fn open(&self, device: &SerialDeviceDescriptor, config: &SerialConfig) -> Result<OpenedPort, OpenError> {
        let name = device.port_name.as_str();
        let data_bits = to_serialport_data_bits(config.data_bits)
            .ok_or_else(|| OpenError::configuration(name, format!("unsupported data bits: {}", config.data_bits)))?;
        let stop_bits = to_serialport_stop_bits(config.stop_bits)
            .ok_or_else(|| OpenError::configuration(name, format!("unsupported stop bits: {}", config.stop_bits)))?;

        // The writer keeps the write timeout; where the platform allows, the
        // reader clone gets the shorter poll interval so the read loop can
        // notice a stop request.
        let port = serialport::new(name, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(to_serialport_parity(config.parity))
            .flow_control(serialport::FlowControl::None)
            .timeout(config.write_timeout)
            .open()
            .map_err(|e| open_error(name, e))?;

        let mut reader = port.try_clone().map_err(|e| open_error(name, e))?;
        if let Some(timeout) = reader_timeout(config) {
            reader.set_timeout(timeout).map_err(|e| open_error(name, e))?;
        }

        Ok(OpenedPort {
            writer: Box::new(SystemWriter(port)),
            reader: Box::new(SystemReader(reader)),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
