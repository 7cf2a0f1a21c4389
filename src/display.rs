// src/display.rs
//
// Output side of the bridge: the attached-device list and the running log of
// text received from the controller.

use std::io::Write;

use crate::io::frames::ascii_text;
use crate::io::serial::SerialDeviceDescriptor;

pub const NO_DEVICES: &str = "No devices found";

/// One `"<manufacturer> : <product>"` line per device, or [`NO_DEVICES`]
pub fn format_device_list(devices: &[SerialDeviceDescriptor]) -> String {
    if devices.is_empty() {
        return NO_DEVICES.to_string();
    }
    devices
        .iter()
        .map(SerialDeviceDescriptor::display_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub trait Display: Send {
    /// Replace the device list
    fn show_devices(&mut self, devices: &[SerialDeviceDescriptor]);

    /// Append raw inbound bytes. Chunks are not lines.
    fn append_received(&mut self, bytes: &[u8]);
}

/// Writes to any `Write`, stdout in the binary
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
    /// Whether the last received chunk left a line open
    mid_line: bool,
}

impl ConsoleDisplay<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out, mid_line: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Display for ConsoleDisplay<W> {
    fn show_devices(&mut self, devices: &[SerialDeviceDescriptor]) {
        let mut text = String::new();
        if self.mid_line {
            text.push('\n');
            self.mid_line = false;
        }
        text.push_str("--- devices ---\n");
        text.push_str(&format_device_list(devices));
        text.push('\n');
        // Console output is best-effort
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn append_received(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let text = ascii_text(bytes);
        self.mid_line = !text.ends_with('\n');
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}
