// src/io/supervisor.rs
//
// Connection state machine for the single controller link.
//
// Every "device set changed" notification re-enumerates the attached devices
// and re-derives the desired state from scratch:
//
// | matched | state        | action                                   |
// |---------|--------------|------------------------------------------|
// | yes     | Disconnected | open, start read loop, send READ         |
// | no      | Connected    | close                                    |
// | yes     | Connected    | nothing                                  |
// | no      | Disconnected | nothing                                  |
//
// The supervisor is the only owner of the open SerialLink. Everything else
// writes through FrameSink, which fails with NotConnected when there is no
// link rather than handing out the handle.

use std::sync::Arc;

use super::codec::Frame;
use super::error::{OpenError, WriteError};
use super::frames::Command;
use super::serial::{DeviceMatcher, SerialConfig, SerialDeviceDescriptor, SerialLink, Transport};
use super::ConnectionState;

/// Receives every chunk the read loop delivers, on the read thread
pub type DataConsumer = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Anything frames can be written to
pub trait FrameSink {
    /// Encode and write one frame. Errors are ignorable by contract.
    fn send_frame(&mut self, frame: &Frame) -> Result<(), WriteError>;
}

/// Outcome of one device-set notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Connected { port: String },
    Disconnected { port: String, reason: String },
    /// A match was found but could not be opened; still Disconnected
    OpenFailed(OpenError),
    Unchanged,
}

pub struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    matcher: DeviceMatcher,
    config: SerialConfig,
    on_data: DataConsumer,
    /// Last enumeration result
    devices: Vec<SerialDeviceDescriptor>,
    link: Option<SerialLink>,
    /// Set after a failed write, cleared by the next success. Only the first
    /// failure of a run is logged.
    write_failing: bool,
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        matcher: DeviceMatcher,
        config: SerialConfig,
        on_data: DataConsumer,
    ) -> Self {
        Self {
            transport,
            matcher,
            config,
            on_data,
            devices: Vec::new(),
            link: None,
            write_failing: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &self.link {
            Some(link) => ConnectionState::Connected(link.port_name().to_string()),
            None => ConnectionState::Disconnected,
        }
    }

    /// Devices seen by the most recent enumeration
    pub fn devices(&self) -> &[SerialDeviceDescriptor] {
        &self.devices
    }

    /// Write capability for the current link, only while connected.
    /// The borrow ends before the next notification can replace the link.
    pub fn writer(&mut self) -> Option<LinkWriter<'_>> {
        if self.link.is_some() {
            Some(LinkWriter { supervisor: self })
        } else {
            None
        }
    }

    /// Re-enumerate and reconcile the connection with the attached devices.
    pub fn handle_device_set_changed(&mut self) -> Transition {
        match self.transport.enumerate() {
            Ok(devices) => self.devices = devices,
            Err(e) => {
                // Keep the current state; the next notification re-evaluates
                tlog!("[supervisor] Enumeration failed: {}", e);
                return Transition::Unchanged;
            }
        }

        let matched = self.matcher.find_match(&self.devices);
        match (matched, self.link.is_some()) {
            (Some(index), false) => {
                let device = self.devices[index].clone();
                self.connect(&device)
            }
            (None, true) => self.disconnect("device detached"),
            _ => Transition::Unchanged,
        }
    }

    /// Close the link if one is open (process shutdown).
    pub fn teardown(&mut self) -> Transition {
        if self.link.is_some() {
            self.disconnect("shutdown")
        } else {
            Transition::Unchanged
        }
    }

    /// Encode and write one frame to the current link.
    ///
    /// Returns NotConnected without any I/O when Disconnected. Write failures
    /// never change the connection state.
    pub fn send(&mut self, frame: &Frame) -> Result<(), WriteError> {
        let link = self.link.as_mut().ok_or(WriteError::NotConnected)?;
        let bytes = frame.encode();
        vlog!("[supervisor] -> {} {}", link.port_name(), hex::encode(&bytes));

        match link.write(&bytes) {
            Ok(()) => {
                if self.write_failing {
                    tlog!("[supervisor] Writes to {} recovered", link.port_name());
                    self.write_failing = false;
                }
                Ok(())
            }
            Err(e) => {
                if !self.write_failing {
                    tlog!(
                        "[supervisor] Write to {} failed: {} (dropping frames until it recovers)",
                        link.port_name(),
                        e
                    );
                    self.write_failing = true;
                }
                Err(e)
            }
        }
    }

    fn connect(&mut self, device: &SerialDeviceDescriptor) -> Transition {
        let label = self
            .matcher
            .identify(device)
            .map(|id| id.label.clone())
            .unwrap_or_default();
        tlog!(
            "[supervisor] Matched {} ({} {}) on {}",
            device.usb_id(),
            label,
            device.display_line(),
            device.port_name
        );

        let mut link = match SerialLink::open(self.transport.as_ref(), device, &self.config) {
            Ok(link) => link,
            Err(e) => {
                tlog!("[supervisor] Open failed, staying disconnected: {}", e);
                return Transition::OpenFailed(e);
            }
        };

        let on_data = self.on_data.clone();
        if let Err(e) = link.start_read_loop(move |chunk| on_data(chunk)) {
            tlog!("[supervisor] Could not start read loop: {}", e);
            link.close();
            return Transition::OpenFailed(OpenError::io(&device.port_name, e.to_string()));
        }

        let port = device.port_name.clone();
        self.link = Some(link);
        self.write_failing = false;
        tlog!("[supervisor] Connected to {}", port);

        // Elicit the controller's diagnostic line
        if let Err(e) = self.send(&Frame::Command(Command::Read)) {
            tlog!("[supervisor] Initial READ not sent: {}", e);
        }

        Transition::Connected { port }
    }

    fn disconnect(&mut self, reason: &str) -> Transition {
        let Some(mut link) = self.link.take() else {
            return Transition::Unchanged;
        };
        let port = link.port_name().to_string();
        link.close();
        tlog!("[supervisor] Disconnected from {} ({})", port, reason);
        Transition::Disconnected {
            port,
            reason: reason.to_string(),
        }
    }
}

impl FrameSink for ConnectionSupervisor {
    fn send_frame(&mut self, frame: &Frame) -> Result<(), WriteError> {
        self.send(frame)
    }
}

/// Borrowed write handle for the link that is open right now
pub struct LinkWriter<'a> {
    supervisor: &'a mut ConnectionSupervisor,
}

impl LinkWriter<'_> {
    pub fn port_name(&self) -> &str {
        self.supervisor
            .link
            .as_ref()
            .map(|l| l.port_name())
            .unwrap_or_default()
    }
}

impl FrameSink for LinkWriter<'_> {
    fn send_frame(&mut self, frame: &Frame) -> Result<(), WriteError> {
        self.supervisor.send(frame)
    }
}

// ============================================================================
// Tests
// ============================================================================
