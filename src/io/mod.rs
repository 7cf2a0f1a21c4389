// src/io/mod.rs
//
// Serial bridge I/O: wire codec, serial driver and the connection supervisor.
// Shared sample/state types used across the bridge live here.

// Core modules
pub mod codec; // ProtocolVariant and the FrameCodec implementations
mod error;
pub mod frames; // binary / human-readable / command encodings

// Serial driver
pub mod serial;
pub mod supervisor;

pub use codec::{Axis, Cadence, Frame, FrameCodec, ProtocolVariant};
pub use error::{CodecError, IoError, OpenError, WriteError};
pub use frames::Command;
pub use supervisor::{ConnectionSupervisor, FrameSink, Transition};

use serde::{Deserialize, Serialize};

// ============================================================================
// Shared Types
// ============================================================================

/// Three-axis reading as delivered by the motion sensor subsystem
pub type Vector3 = [f32; 3];

/// Latest accelerometer and angular-rate vectors.
///
/// Overwritten in place on each reading; no history is kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub accel: Vector3,
    pub gyro: Vector3,
}

/// Which sensor produced a reading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
}

/// One sensor event
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub values: Vector3,
}

impl SensorReading {
    pub fn accel(values: Vector3) -> Self {
        Self {
            kind: SensorKind::Accelerometer,
            values,
        }
    }

    pub fn gyro(values: Vector3) -> Self {
        Self {
            kind: SensorKind::Gyroscope,
            values,
        }
    }
}

/// Lifecycle of the single controller connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "port")]
pub enum ConnectionState {
    /// Initial state, and the state after any teardown
    Disconnected,
    /// A link is open on the named port
    Connected(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }
}
