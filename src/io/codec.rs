// src/io/codec.rs
//
// Protocol variants and the shared frame codec interface.
//
// Several incompatible revisions of the controller protocol exist. Each one is
// a FrameCodec implementation; ProtocolVariant picks one from configuration so
// the telemetry dispatcher never branches on protocol details itself.
//
// | Variant          | Tags    | Payload                         | Cadence         |
// |------------------|---------|---------------------------------|-----------------|
// | pitch_binary     | V       | accel.y, gyro.y (binary)        | accumulate/pair |
// | per_axis_binary  | U V W   | accel.n, gyro.n (binary)        | accumulate/pair |
// | combined_binary  | Z       | accel.xyz, gyro.xyz (binary)    | accumulate/pair |
// | human_readable   | X Y Z   | accel.n, gyro.n (+ddddd)        | accumulate/pair |
// | derived_angle    | A       | tilt deg*100, gyro.x (+ddddd)   | fresh pair      |
//
// Command frames (HIGH, LOW, READ) are valid under every variant. Within one
// variant the first byte of every frame type is unique.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::io::error::CodecError;
use crate::io::frames::{binary, human, Command};
use crate::io::{MotionSample, Vector3};

// ============================================================================
// Frames
// ============================================================================

/// Sensor axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn binary_tag(self) -> u8 {
        match self {
            Axis::X => b'U',
            Axis::Y => b'V',
            Axis::Z => b'W',
        }
    }

    fn readable_tag(self) -> u8 {
        match self {
            Axis::X => b'X',
            Axis::Y => b'Y',
            Axis::Z => b'Z',
        }
    }
}

/// One outgoing wire message. Built and sent immediately, never stored.
///
/// Telemetry values are already scaled integers (milli-units, or
/// centi-degrees for the tilt angle).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// `U`/`V`/`W` + accel + gyro for one axis, signed-magnitude
    AxisBinary { axis: Axis, accel: i32, gyro: i32 },
    /// `Z` + accel x,y,z + gyro x,y,z, signed-magnitude
    CombinedBinary { accel: [i32; 3], gyro: [i32; 3] },
    /// `X`/`Y`/`Z` + accel + gyro for one axis, human-readable
    AxisReadable { axis: Axis, accel: i32, gyro: i32 },
    /// `A` + tilt angle (deg * 100) + angular rate, human-readable
    TiltAngle { centi_degrees: i32, rate: i32 },
    /// `HIGH` / `LOW` / `READ`
    Command(Command),
}

impl Frame {
    /// Tag byte that starts this frame on the wire
    pub fn tag(&self) -> u8 {
        match self {
            Frame::AxisBinary { axis, .. } => axis.binary_tag(),
            Frame::CombinedBinary { .. } => b'Z',
            Frame::AxisReadable { axis, .. } => axis.readable_tag(),
            Frame::TiltAngle { .. } => b'A',
            Frame::Command(cmd) => cmd.tag(),
        }
    }

    /// Encode to wire bytes, including the trailing `\n`.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::AxisBinary { accel, gyro, .. } => binary::encode_frame(self.tag(), &[*accel, *gyro]),
            Frame::CombinedBinary { accel, gyro } => binary::encode_frame(
                self.tag(),
                &[accel[0], accel[1], accel[2], gyro[0], gyro[1], gyro[2]],
            ),
            Frame::AxisReadable { accel, gyro, .. } => human::encode_frame(self.tag(), &[*accel, *gyro]),
            Frame::TiltAngle { centi_degrees, rate } => {
                human::encode_frame(self.tag(), &[*centi_degrees, *rate])
            }
            Frame::Command(cmd) => cmd.encode(),
        }
    }
}

impl From<Command> for Frame {
    fn from(cmd: Command) -> Self {
        Frame::Command(cmd)
    }
}

// ============================================================================
// Frame Codec Trait
// ============================================================================

/// When the telemetry dispatcher emits frames
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// Store accelerometer readings; emit on every angular-rate reading using
    /// the last-known accelerometer vector
    AccumulateAndPair,
    /// Emit only once both a fresh accelerometer and a fresh angular-rate
    /// reading have arrived since the last emission
    FreshPair,
}

/// One protocol revision: how a motion sample becomes frames, and how a line
/// in that revision is parsed back.
pub trait FrameCodec: Send + Sync {
    /// Config name of the revision
    fn name(&self) -> &'static str;

    fn cadence(&self) -> Cadence;

    /// Telemetry frames for one sample, in the order they must be written
    fn frames(&self, sample: &MotionSample) -> Vec<Frame>;

    /// Tag bytes this revision uses for telemetry
    fn telemetry_tags(&self) -> &'static [u8];

    /// Decode a telemetry payload. `tag` is one of `telemetry_tags()`.
    fn decode_telemetry(&self, tag: u8, payload: &[u8]) -> Result<Frame, CodecError>;
}

/// Parse one line (including its `\n`) using tag-first dispatch.
pub fn decode_line(codec: &dyn FrameCodec, line: &[u8]) -> Result<Frame, CodecError> {
    if line.is_empty() {
        return Err(CodecError::Empty);
    }
    let body = match line.split_last() {
        Some((b'\n', body)) if !body.contains(&b'\n') => body,
        _ => return Err(CodecError::Terminator),
    };
    let (&tag, payload) = body.split_first().ok_or(CodecError::Empty)?;

    if codec.telemetry_tags().contains(&tag) {
        return codec.decode_telemetry(tag, payload);
    }
    Command::from_wire(body)
        .map(Frame::Command)
        .ok_or(CodecError::UnknownTag(tag))
}

fn milli(v: &Vector3) -> [i32; 3] {
    [
        binary::scale_milli(v[0]),
        binary::scale_milli(v[1]),
        binary::scale_milli(v[2]),
    ]
}

fn axis_for_tag(tag: u8, readable: bool) -> Option<Axis> {
    Axis::ALL.into_iter().find(|a| {
        if readable {
            a.readable_tag() == tag
        } else {
            a.binary_tag() == tag
        }
    })
}

// ============================================================================
// Binary revisions
// ============================================================================

/// Pitch axis only (`V`). The revision the balancing sketch consumes.
pub struct PitchBinary;

impl FrameCodec for PitchBinary {
    fn name(&self) -> &'static str {
        "pitch_binary"
    }

    fn cadence(&self) -> Cadence {
        Cadence::AccumulateAndPair
    }

    fn frames(&self, sample: &MotionSample) -> Vec<Frame> {
        let accel = milli(&sample.accel);
        let gyro = milli(&sample.gyro);
        vec![Frame::AxisBinary {
            axis: Axis::Y,
            accel: accel[1],
            gyro: gyro[1],
        }]
    }

    fn telemetry_tags(&self) -> &'static [u8] {
        b"V"
    }

    fn decode_telemetry(&self, tag: u8, payload: &[u8]) -> Result<Frame, CodecError> {
        PerAxisBinary.decode_telemetry(tag, payload)
    }
}

/// One `U`/`V`/`W` frame per axis, written X then Y then Z.
pub struct PerAxisBinary;

impl FrameCodec for PerAxisBinary {
    fn name(&self) -> &'static str {
        "per_axis_binary"
    }

    fn cadence(&self) -> Cadence {
        Cadence::AccumulateAndPair
    }

    fn frames(&self, sample: &MotionSample) -> Vec<Frame> {
        let accel = milli(&sample.accel);
        let gyro = milli(&sample.gyro);
        Axis::ALL
            .into_iter()
            .map(|axis| Frame::AxisBinary {
                axis,
                accel: accel[axis.index()],
                gyro: gyro[axis.index()],
            })
            .collect()
    }

    fn telemetry_tags(&self) -> &'static [u8] {
        b"UVW"
    }

    fn decode_telemetry(&self, tag: u8, payload: &[u8]) -> Result<Frame, CodecError> {
        let axis = axis_for_tag(tag, false).ok_or(CodecError::UnknownTag(tag))?;
        let values = binary::decode_payload(tag, payload, 2)?;
        Ok(Frame::AxisBinary {
            axis,
            accel: values[0],
            gyro: values[1],
        })
    }
}

/// All six values in a single `Z` frame: one write per sample pair.
pub struct CombinedBinary;

impl FrameCodec for CombinedBinary {
    fn name(&self) -> &'static str {
        "combined_binary"
    }

    fn cadence(&self) -> Cadence {
        Cadence::AccumulateAndPair
    }

    fn frames(&self, sample: &MotionSample) -> Vec<Frame> {
        vec![Frame::CombinedBinary {
            accel: milli(&sample.accel),
            gyro: milli(&sample.gyro),
        }]
    }

    fn telemetry_tags(&self) -> &'static [u8] {
        b"Z"
    }

    fn decode_telemetry(&self, tag: u8, payload: &[u8]) -> Result<Frame, CodecError> {
        let v = binary::decode_payload(tag, payload, 6)?;
        Ok(Frame::CombinedBinary {
            accel: [v[0], v[1], v[2]],
            gyro: [v[3], v[4], v[5]],
        })
    }
}

// ============================================================================
// Human-readable revisions
// ============================================================================

/// One `X`/`Y`/`Z` frame per axis with `+ddddd` fields.
pub struct HumanReadable;

impl FrameCodec for HumanReadable {
    fn name(&self) -> &'static str {
        "human_readable"
    }

    fn cadence(&self) -> Cadence {
        Cadence::AccumulateAndPair
    }

    fn frames(&self, sample: &MotionSample) -> Vec<Frame> {
        let accel = milli(&sample.accel);
        let gyro = milli(&sample.gyro);
        Axis::ALL
            .into_iter()
            .map(|axis| Frame::AxisReadable {
                axis,
                accel: accel[axis.index()],
                gyro: gyro[axis.index()],
            })
            .collect()
    }

    fn telemetry_tags(&self) -> &'static [u8] {
        b"XYZ"
    }

    fn decode_telemetry(&self, tag: u8, payload: &[u8]) -> Result<Frame, CodecError> {
        let axis = axis_for_tag(tag, true).ok_or(CodecError::UnknownTag(tag))?;
        let values = human::decode_payload(tag, payload, 2)?;
        Ok(Frame::AxisReadable {
            axis,
            accel: values[0],
            gyro: values[1],
        })
    }
}

/// Host-side tilt estimate: `A` + atan2(accel.z, accel.y) in centi-degrees,
/// plus the roll-axis angular rate in milli-units.
pub struct DerivedAngle;

impl DerivedAngle {
    /// Tilt in degrees * 100, floored
    pub fn tilt_centi_degrees(accel: &Vector3) -> i32 {
        let degrees = (accel[2] as f64).atan2(accel[1] as f64).to_degrees();
        (degrees * 100.0).floor() as i32
    }
}

impl FrameCodec for DerivedAngle {
    fn name(&self) -> &'static str {
        "derived_angle"
    }

    fn cadence(&self) -> Cadence {
        Cadence::FreshPair
    }

    fn frames(&self, sample: &MotionSample) -> Vec<Frame> {
        vec![Frame::TiltAngle {
            centi_degrees: Self::tilt_centi_degrees(&sample.accel),
            rate: binary::scale_milli(sample.gyro[Axis::X.index()]),
        }]
    }

    fn telemetry_tags(&self) -> &'static [u8] {
        b"A"
    }

    fn decode_telemetry(&self, tag: u8, payload: &[u8]) -> Result<Frame, CodecError> {
        let values = human::decode_payload(tag, payload, 2)?;
        Ok(Frame::TiltAngle {
            centi_degrees: values[0],
            rate: values[1],
        })
    }
}

// ============================================================================
// Protocol Variant
// ============================================================================

/// Configuration-selected protocol revision
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    #[default]
    PitchBinary,
    PerAxisBinary,
    CombinedBinary,
    HumanReadable,
    DerivedAngle,
}

impl ProtocolVariant {
    pub const ALL: [ProtocolVariant; 5] = [
        ProtocolVariant::PitchBinary,
        ProtocolVariant::PerAxisBinary,
        ProtocolVariant::CombinedBinary,
        ProtocolVariant::HumanReadable,
        ProtocolVariant::DerivedAngle,
    ];

    pub fn codec(self) -> &'static dyn FrameCodec {
        match self {
            ProtocolVariant::PitchBinary => &PitchBinary,
            ProtocolVariant::PerAxisBinary => &PerAxisBinary,
            ProtocolVariant::CombinedBinary => &CombinedBinary,
            ProtocolVariant::HumanReadable => &HumanReadable,
            ProtocolVariant::DerivedAngle => &DerivedAngle,
        }
    }

    /// Parse one `\n`-terminated line under this revision
    pub fn decode(self, line: &[u8]) -> Result<Frame, CodecError> {
        decode_line(self.codec(), line)
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec().name())
    }
}

impl FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ProtocolVariant::ALL
            .into_iter()
            .find(|v| v.codec().name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = ProtocolVariant::ALL.iter().map(|v| v.codec().name()).collect();
                format!("Unknown protocol {:?}; expected one of {}", s, names.join(", "))
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
