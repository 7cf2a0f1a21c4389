// src/io/serial/mock.rs
//
// In-memory transport for tests.
//
// Records every write and ready-line change. Tests can attach and detach
// devices, inject inbound chunks, and force open, write or read failures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::link::SerialConfig;
use super::transport::{OpenedPort, PortReader, PortWriter, SerialDeviceDescriptor, Transport};
use crate::io::error::{IoError, OpenError};

#[derive(Default)]
struct MockState {
    devices: Vec<SerialDeviceDescriptor>,
    enumerate_error: bool,
    open_error: Option<OpenError>,
    opens: usize,
    last_config: Option<SerialConfig>,
    failing_writes: usize,
    writes: Vec<Vec<u8>>,
    ready_line_changes: Vec<bool>,
    inbound: VecDeque<std::io::Result<Vec<u8>>>,
}

/// Mock serial transport
///
/// Clones share state, so a test can keep one handle while the code under
/// test owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, device: SerialDeviceDescriptor) {
        self.state.lock().unwrap().devices.push(device);
    }

    pub fn detach(&self, port_name: &str) {
        self.state
            .lock()
            .unwrap()
            .devices
            .retain(|d| d.port_name != port_name);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.state.lock().unwrap().enumerate_error = fail;
    }

    pub fn fail_next_open(&self, error: OpenError) {
        self.state.lock().unwrap().open_error = Some(error);
    }

    /// The next `n` writes time out
    pub fn fail_next_writes(&self, n: usize) {
        self.state.lock().unwrap().failing_writes = n;
    }

    pub fn inject_rx(&self, bytes: &[u8]) {
        self.state.lock().unwrap().inbound.push_back(Ok(bytes.to_vec()));
    }

    pub fn inject_read_error(&self) {
        self.state
            .lock()
            .unwrap()
            .inbound
            .push_back(Err(std::io::Error::new(std::io::ErrorKind::Other, "device reset")));
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn last_config(&self) -> Option<SerialConfig> {
        self.state.lock().unwrap().last_config.clone()
    }

    /// Every successful write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn ready_line_changes(&self) -> Vec<bool> {
        self.state.lock().unwrap().ready_line_changes.clone()
    }

    /// Current DTR level, `None` if never driven
    pub fn ready_line(&self) -> Option<bool> {
        self.state.lock().unwrap().ready_line_changes.last().copied()
    }
}

impl Transport for MockTransport {
    fn enumerate(&self) -> Result<Vec<SerialDeviceDescriptor>, IoError> {
        let state = self.state.lock().unwrap();
        if state.enumerate_error {
            return Err(IoError::connection("mock", "enumeration failed"));
        }
        Ok(state.devices.clone())
    }

    fn open(&self, _device: &SerialDeviceDescriptor, config: &SerialConfig) -> Result<OpenedPort, OpenError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.open_error.take() {
            return Err(e);
        }
        state.opens += 1;
        state.last_config = Some(config.clone());
        drop(state);

        Ok(OpenedPort {
            writer: Box::new(MockWriter {
                state: self.state.clone(),
            }),
            reader: Box::new(MockReader {
                state: self.state.clone(),
            }),
        })
    }
}

struct MockWriter {
    state: Arc<Mutex<MockState>>,
}

impl PortWriter for MockWriter {
    fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "write timed out"));
        }
        state.writes.push(bytes.to_vec());
        Ok(())
    }

    fn set_ready_line(&mut self, asserted: bool) -> std::io::Result<()> {
        self.state.lock().unwrap().ready_line_changes.push(asserted);
        Ok(())
    }
}

struct MockReader {
    state: Arc<Mutex<MockState>>,
}

impl PortReader for MockReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let next = self.state.lock().unwrap().inbound.pop_front();
        match next {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => {
                std::thread::sleep(Duration::from_millis(2));
                Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"))
            }
        }
    }
}

pub fn usb_device(port: &str, vendor_id: u16, product_id: u16, manufacturer: &str, product: &str) -> SerialDeviceDescriptor {
    SerialDeviceDescriptor {
        port_name: port.to_string(),
        vendor_id,
        product_id,
        manufacturer: Some(manufacturer.to_string()),
        product: Some(product.to_string()),
        serial_number: None,
    }
}

pub fn arduino_uno(port: &str) -> SerialDeviceDescriptor {
    usb_device(port, 0x2341, 0x0043, "Arduino (www.arduino.cc)", "Arduino Uno")
}

/// Not on the default allow-list
pub fn usb_keyboard(port: &str) -> SerialDeviceDescriptor {
    usb_device(port, 0x046D, 0xC31C, "Logitech", "USB Keyboard")
}
