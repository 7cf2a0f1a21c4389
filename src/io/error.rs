// src/io/error.rs
//
// Error types for the serial bridge.
//
// None of these are fatal to the process. OpenError leaves the supervisor
// Disconnected until the next attach notification, WriteError is dropped by
// telemetry callers, and IoError covers enumeration/read-loop/settings faults.

use std::fmt;

// ============================================================================
// Open errors
// ============================================================================

/// Why a device could not be claimed and configured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenError {
    /// The device is no longer enumerated (detached between scan and open)
    NotAttached { device: String },
    /// Another process (or a previous link) still holds the port
    Busy { device: String, message: String },
    /// The OS refused access to the port
    PermissionDenied { device: String, message: String },
    /// The port opened but rejected the requested line parameters
    Configuration { device: String, message: String },
    /// Any other I/O failure during open
    Io { device: String, message: String },
}

impl OpenError {
    pub fn not_attached(device: impl Into<String>) -> Self {
        OpenError::NotAttached {
            device: device.into(),
        }
    }

    pub fn busy(device: impl Into<String>, message: impl Into<String>) -> Self {
        OpenError::Busy {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(device: impl Into<String>, message: impl Into<String>) -> Self {
        OpenError::PermissionDenied {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn configuration(device: impl Into<String>, message: impl Into<String>) -> Self {
        OpenError::Configuration {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn io(device: impl Into<String>, message: impl Into<String>) -> Self {
        OpenError::Io {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Port path or label of the device the error refers to
    pub fn device(&self) -> &str {
        match self {
            OpenError::NotAttached { device }
            | OpenError::Busy { device, .. }
            | OpenError::PermissionDenied { device, .. }
            | OpenError::Configuration { device, .. }
            | OpenError::Io { device, .. } => device,
        }
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::NotAttached { device } => write!(f, "{}: device not attached", device),
            OpenError::Busy { device, message } => write!(f, "{}: device busy: {}", device, message),
            OpenError::PermissionDenied { device, message } => {
                write!(f, "{}: permission denied: {}", device, message)
            }
            OpenError::Configuration { device, message } => {
                write!(f, "{}: configuration rejected: {}", device, message)
            }
            OpenError::Io { device, message } => write!(f, "{}: {}", device, message),
        }
    }
}

impl std::error::Error for OpenError {}

// ============================================================================
// Write errors
// ============================================================================

/// A single failed write. Never closes the link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteError {
    /// No link is open; no I/O was attempted
    NotConnected,
    /// The write did not complete within the port's write timeout
    TimedOut,
    /// Transport-level failure
    Io(String),
}

impl WriteError {
    /// Telemetry and command writes are best-effort: every write error may be
    /// dropped by the caller, and the next scheduled frame is the retry.
    pub fn is_ignorable(&self) -> bool {
        true
    }

    pub(crate) fn from_io(e: &std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            WriteError::TimedOut
        } else {
            WriteError::Io(e.to_string())
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::NotConnected => write!(f, "not connected"),
            WriteError::TimedOut => write!(f, "write timed out"),
            WriteError::Io(msg) => write!(f, "write failed: {}", msg),
        }
    }
}

impl std::error::Error for WriteError {}

// ============================================================================
// Codec errors
// ============================================================================

/// Failure to parse an inbound line with the tag-first framing rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Zero-length line
    Empty,
    /// First byte is not a tag known to the selected protocol variant
    UnknownTag(u8),
    /// Payload length does not match the tag's layout
    Length { tag: u8, expected: usize, actual: usize },
    /// Line is missing the `\n` terminator or contains an embedded one
    Terminator,
    /// Human-readable field is not `[+-]ddddd`
    Field(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Empty => write!(f, "empty frame"),
            CodecError::UnknownTag(tag) => write!(f, "unknown frame tag 0x{:02X}", tag),
            CodecError::Length {
                tag,
                expected,
                actual,
            } => write!(
                f,
                "frame '{}' payload is {} bytes, expected {}",
                *tag as char, actual, expected
            ),
            CodecError::Terminator => write!(f, "frame must end with exactly one newline"),
            CodecError::Field(field) => write!(f, "invalid human-readable field: {:?}", field),
        }
    }
}

impl std::error::Error for CodecError {}

// ============================================================================
// General I/O errors
// ============================================================================

/// Errors from enumeration, the read loop and settings loading
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IoError {
    Connection { device: String, message: String },
    Read { device: String, message: String },
    Protocol { protocol: String, message: String },
    Configuration(String),
}

impl IoError {
    pub fn connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Connection {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn read(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Read {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn protocol(protocol: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Protocol {
            protocol: protocol.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        IoError::Configuration(message.into())
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Connection { device, message } => {
                write!(f, "connection error on {}: {}", device, message)
            }
            IoError::Read { device, message } => write!(f, "read error on {}: {}", device, message),
            IoError::Protocol { protocol, message } => write!(f, "{} protocol error: {}", protocol, message),
            IoError::Configuration(message) => write!(f, "configuration error: {}", message),
        }
    }
}

impl std::error::Error for IoError {}

impl From<IoError> for String {
    fn from(e: IoError) -> Self {
        e.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_from_timeout() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(WriteError::from_io(&e), WriteError::TimedOut);

        let e = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(WriteError::from_io(&e), WriteError::Io(_)));
    }

    #[test]
    fn test_write_errors_are_ignorable() {
        assert!(WriteError::NotConnected.is_ignorable());
        assert!(WriteError::TimedOut.is_ignorable());
        assert!(WriteError::Io("x".into()).is_ignorable());
    }

    #[test]
    fn test_open_error_display_includes_device() {
        let e = OpenError::busy("/dev/ttyACM0", "already claimed");
        assert_eq!(e.device(), "/dev/ttyACM0");
        assert_eq!(e.to_string(), "/dev/ttyACM0: device busy: already claimed");
    }
}
