// src/io/frames/human.rs
//
// Human-readable telemetry frame family, easier to eyeball on a serial monitor.
//
// Frame format:
//   <TAG:1> <FIELD:6>* '\n'
//
// FIELD is a sign character followed by exactly five zero-padded decimal
// digits, e.g. +00042 or -00007.

use crate::io::error::CodecError;

/// Width of one field: sign + five digits
pub const FIELD_LEN: usize = 6;

/// Largest magnitude five digits can carry
pub const MAX_FIELD_MAGNITUDE: i32 = 99_999;

/// Encode one scaled integer as a six-byte field. Magnitudes above 99999 saturate.
pub fn encode_field(n: i32) -> [u8; FIELD_LEN] {
    let sign = if n >= 0 { b'+' } else { b'-' };
    let mut v = n.unsigned_abs().min(MAX_FIELD_MAGNITUDE as u32);

    let mut out = [sign, b'0', b'0', b'0', b'0', b'0'];
    for slot in out[1..].iter_mut().rev() {
        *slot = b'0' + (v % 10) as u8;
        v /= 10;
    }
    out
}

/// Parse one six-byte field.
pub fn decode_field(field: &[u8]) -> Result<i32, CodecError> {
    let invalid = || CodecError::Field(String::from_utf8_lossy(field).into_owned());

    if field.len() != FIELD_LEN {
        return Err(invalid());
    }

    let negative = match field[0] {
        b'+' => false,
        b'-' => true,
        _ => return Err(invalid()),
    };

    let mut magnitude: i32 = 0;
    for &digit in &field[1..] {
        if !digit.is_ascii_digit() {
            return Err(invalid());
        }
        magnitude = magnitude * 10 + (digit - b'0') as i32;
    }

    Ok(if negative { -magnitude } else { magnitude })
}

/// Build a complete human-readable frame.
pub fn encode_frame(tag: u8, values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + values.len() * FIELD_LEN + 1);
    out.push(tag);
    for &v in values {
        out.extend_from_slice(&encode_field(v));
    }
    out.push(b'\n');
    out
}

/// Decode the payload of a human-readable frame (tag and terminator removed).
pub fn decode_payload(tag: u8, payload: &[u8], expected_values: usize) -> Result<Vec<i32>, CodecError> {
    let expected = expected_values * FIELD_LEN;
    if payload.len() != expected {
        return Err(CodecError::Length {
            tag,
            expected,
            actual: payload.len(),
        });
    }

    payload.chunks_exact(FIELD_LEN).map(decode_field).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_field_examples() {
        assert_eq!(&encode_field(42), b"+00042");
        assert_eq!(&encode_field(-7), b"-00007");
        assert_eq!(&encode_field(0), b"+00000");
        assert_eq!(&encode_field(32767), b"+32767");
        assert_eq!(&encode_field(-32768), b"-32768");
    }

    #[test]
    fn test_encode_field_saturates() {
        assert_eq!(&encode_field(123_456), b"+99999");
        assert_eq!(&encode_field(i32::MIN), b"-99999");
    }

    #[test]
    fn test_decode_field_rejects_garbage() {
        assert!(decode_field(b"00042").is_err());
        assert!(decode_field(b"*00042").is_err());
        assert!(decode_field(b"+00a42").is_err());
        assert!(decode_field(b"+000042").is_err());
    }

    #[test]
    fn test_encode_frame() {
        assert_eq!(encode_frame(b'Y', &[9810, -250]), b"Y+09810-00250\n".to_vec());
    }

    proptest! {
        #[test]
        fn prop_field_is_always_six_ascii_bytes(n in any::<i32>()) {
            let field = encode_field(n);
            prop_assert_eq!(field.len(), FIELD_LEN);
            prop_assert!(field[0] == b'+' || field[0] == b'-');
            prop_assert!(field[1..].iter().all(|b| b.is_ascii_digit()));
        }

        #[test]
        fn prop_field_roundtrip(n in -MAX_FIELD_MAGNITUDE..=MAX_FIELD_MAGNITUDE) {
            prop_assert_eq!(decode_field(&encode_field(n)).unwrap(), n);
        }
    }
}
