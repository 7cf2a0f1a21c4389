// src/io/serial/link.rs
//
// One open serial connection to the controller.
//
// Writes are synchronous and bounded by the port write timeout. Reads run on a
// dedicated blocking thread that hands each chunk to a consumer callback; the
// thread polls a cancel flag between bounded reads so stop() is prompt.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use super::transport::{PortReader, PortWriter, SerialDeviceDescriptor, Transport};
use super::utils::Parity;
use crate::io::error::{IoError, OpenError, WriteError};

// ============================================================================
// Types and Configuration
// ============================================================================

/// Serial line parameters for the controller link
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Upper bound for one frame write
    pub write_timeout: Duration,
    /// Read poll interval; also bounds how long stop() waits for the read thread.
    /// Windows shares one timeout between both halves, so reads poll at
    /// `write_timeout` there.
    pub read_poll: Duration,
    /// Assert DTR after opening (the controller waits for it)
    pub assert_ready_line: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            write_timeout: Duration::from_millis(100),
            read_poll: Duration::from_millis(50),
            assert_ready_line: true,
        }
    }
}

impl SerialConfig {
    /// e.g. `115200 8N1`
    pub fn summary(&self) -> String {
        format!(
            "{} {}{}{}",
            self.baud_rate,
            self.data_bits,
            self.parity.letter(),
            self.stop_bits
        )
    }
}

const READ_BUF_LEN: usize = 256;

// ============================================================================
// Serial Link
// ============================================================================

/// Exclusive owner of one open port.
///
/// A new link is created for every successful open, so a handle from a
/// previous connection can never write to the current one.
pub struct SerialLink {
    port_name: String,
    writer: Option<Box<dyn PortWriter>>,
    /// Taken by the read loop when it starts
    reader: Option<Box<dyn PortReader>>,
    ready_line: bool,
    cancel_flag: Arc<AtomicBool>,
    read_task: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Claim the device, configure it and raise the ready line.
    ///
    /// No read loop is running when this returns; on error nothing is left open.
    pub fn open(
        transport: &dyn Transport,
        device: &SerialDeviceDescriptor,
        config: &SerialConfig,
    ) -> Result<Self, OpenError> {
        let opened = transport.open(device, config)?;

        let mut link = Self {
            port_name: device.port_name.clone(),
            writer: Some(opened.writer),
            reader: Some(opened.reader),
            ready_line: false,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            read_task: None,
        };

        if config.assert_ready_line {
            if let Some(writer) = link.writer.as_mut() {
                writer.set_ready_line(true).map_err(|e| {
                    OpenError::configuration(&device.port_name, format!("failed to assert DTR: {}", e))
                })?;
                link.ready_line = true;
            }
        }

        tlog!(
            "[serial] Opened {} at {} (DTR = {})",
            link.port_name,
            config.summary(),
            if link.ready_line { "1" } else { "0" }
        );

        Ok(link)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn ready_line(&self) -> bool {
        self.ready_line
    }

    /// True while the read thread is alive
    pub fn is_reading(&self) -> bool {
        self.read_task.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Write one encoded frame.
    ///
    /// A failure leaves the link open: the caller drops this frame and the next
    /// scheduled one is the retry. On a closed link no I/O is attempted.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        let writer = self.writer.as_mut().ok_or(WriteError::NotConnected)?;
        writer.write_frame(bytes).map_err(|e| WriteError::from_io(&e))
    }

    /// Start the background read loop.
    ///
    /// `on_data` receives every chunk as it arrives. Chunks are not frames: a
    /// line may be split across calls or several lines may share one. The loop
    /// ends quietly on stop() or on the first read error.
    pub fn start_read_loop<F>(&mut self, mut on_data: F) -> Result<(), IoError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if self.writer.is_none() {
            return Err(IoError::connection(&self.port_name, "link is closed"));
        }
        let mut reader = self
            .reader
            .take()
            .ok_or_else(|| IoError::connection(&self.port_name, "read loop already started"))?;

        self.cancel_flag.store(false, Ordering::SeqCst);
        let cancel_flag = self.cancel_flag.clone();
        let port_name = self.port_name.clone();

        let handle = std::thread::Builder::new()
            .name(format!("serial-read {}", port_name))
            .spawn(move || {
                let mut buf = [0u8; READ_BUF_LEN];
                let reason = loop {
                    if cancel_flag.load(Ordering::SeqCst) {
                        break "stopped".to_string();
                    }

                    match reader.read_chunk(&mut buf) {
                        Ok(0) => {
                            // EOF - port closed/disconnected
                            break "disconnected".to_string();
                        }
                        Ok(n) => on_data(&buf[..n]),
                        Err(ref e)
                            if matches!(
                                e.kind(),
                                std::io::ErrorKind::TimedOut
                                    | std::io::ErrorKind::WouldBlock
                                    | std::io::ErrorKind::Interrupted
                            ) =>
                        {
                            // Timeout is expected for serial reads
                        }
                        Err(e) => break IoError::read(&port_name, e.to_string()).to_string(),
                    }
                };
                tlog!("[serial] Read loop on {} ended: {}", port_name, reason);
            })
            .map_err(|e| IoError::connection(&self.port_name, format!("failed to spawn read thread: {}", e)))?;

        self.read_task = Some(handle);
        Ok(())
    }

    /// Stop the read loop and wait for it to exit. Safe to call repeatedly,
    /// and after the loop already ended on its own.
    pub fn stop(&mut self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.read_task.take() {
            if handle.join().is_err() {
                tlog!("[serial] Read thread on {} panicked", self.port_name);
            }
        }
    }

    /// Stop reading, drop the ready line and release the port.
    /// Closing a link that is not open does nothing.
    pub fn close(&mut self) {
        self.stop();
        self.reader = None;

        let Some(mut writer) = self.writer.take() else {
            return;
        };
        if self.ready_line {
            if let Err(e) = writer.set_ready_line(false) {
                // The device may already be gone; the handle is released either way
                tlog!("[serial] Failed to deassert DTR on {}: {}", self.port_name, e);
            }
            self.ready_line = false;
        }
        drop(writer);
        tlog!("[serial] Closed {}", self.port_name);
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
