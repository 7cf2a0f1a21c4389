// src/io/frames/binary.rs
//
// Binary telemetry frame family.
//
// Frame format:
//   <TAG:1> <VALUE:2>* '\n'
//
// Each VALUE is a 16-bit big-endian signed-magnitude integer:
//   bit 15        sign (0 = non-negative, 1 = negative)
//   bits 14..0    magnitude = ((byte0 & 0x7F) << 8) | byte1
//
// This is NOT two's complement. A magnitude only has 15 bits, so values
// beyond +/-32767 are saturated before encoding.

use crate::io::error::CodecError;

/// Largest magnitude representable in 15 bits
pub const MAX_MAGNITUDE: i32 = 0x7FFF;

/// Bytes per encoded value
pub const VALUE_LEN: usize = 2;

const SIGN_BIT: u8 = 0x80;
const NEWLINE: u8 = b'\n';

/// Scale a physical reading by 1000 and floor toward negative infinity.
///
/// 1.2345 -> 1234, -1.2345 -> -1235. NaN maps to 0 and infinities saturate
/// (Rust float-to-int casts saturate).
pub fn scale_milli(value: f32) -> i32 {
    ((value as f64) * 1000.0).floor() as i32
}

/// Encode one integer as signed-magnitude. Magnitudes above 32767 saturate.
pub fn encode_signed_magnitude(n: i32) -> [u8; VALUE_LEN] {
    let magnitude = n.unsigned_abs().min(MAX_MAGNITUDE as u32) as u16;
    let sign = if n < 0 { SIGN_BIT } else { 0 };
    [sign | (magnitude >> 8) as u8, (magnitude & 0xFF) as u8]
}

/// Decode one signed-magnitude value. `[0x80, 0x00]` (negative zero) is 0.
pub fn decode_signed_magnitude(bytes: [u8; VALUE_LEN]) -> i32 {
    let magnitude = (((bytes[0] & !SIGN_BIT) as i32) << 8) | bytes[1] as i32;
    if bytes[0] & SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode a value so that neither byte is `'\n'`.
///
/// The controller splits its input on newline, so a payload byte of 0x0A
/// would cut the frame short. The value is moved to the nearest magnitude
/// whose encoding is line-safe: a low byte of 0x0A costs one count, a high
/// byte of 0x0A (magnitudes 2560..=2815, non-negative only) snaps to 2559
/// or 2816.
pub fn encode_line_safe(n: i32) -> [u8; VALUE_LEN] {
    let negative = n < 0;
    let mut magnitude = n.unsigned_abs().min(MAX_MAGNITUDE as u32) as i32;

    if !negative && (magnitude >> 8) as u8 == NEWLINE {
        magnitude = if magnitude < 0x0A80 { 0x09FF } else { 0x0B00 };
    }
    if (magnitude & 0xFF) as u8 == NEWLINE {
        magnitude += 1;
    }

    encode_signed_magnitude(if negative { -magnitude } else { magnitude })
}

/// Build a complete binary frame: tag, line-safe values, terminator.
pub fn encode_frame(tag: u8, values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + values.len() * VALUE_LEN + 1);
    out.push(tag);
    for &v in values {
        out.extend_from_slice(&encode_line_safe(v));
    }
    out.push(NEWLINE);
    out
}

/// Decode the payload of a binary frame (tag and terminator already removed).
pub fn decode_payload(tag: u8, payload: &[u8], expected_values: usize) -> Result<Vec<i32>, CodecError> {
    let expected = expected_values * VALUE_LEN;
    if payload.len() != expected {
        return Err(CodecError::Length {
            tag,
            expected,
            actual: payload.len(),
        });
    }

    Ok(payload
        .chunks_exact(VALUE_LEN)
        .map(|pair| decode_signed_magnitude([pair[0], pair[1]]))
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
