// src/io/frames/mod.rs
//
// Wire encodings shared by the protocol variants in io::codec.
// Every frame is one line: <tag><payload>'\n'.

pub mod binary; // signed-magnitude 16-bit values
pub mod command; // HIGH / LOW / READ
pub mod human; // [+-]ddddd fields

pub use command::Command;

/// Render inbound bytes as ASCII text for the display.
///
/// Bytes above 0x7F are not ASCII and become U+FFFD. Chunk boundaries are
/// arbitrary, so callers append rather than treat a chunk as a line.
pub fn ascii_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_text() {
        assert_eq!(ascii_text(b"OK 42\r\n"), "OK 42\r\n");
        assert_eq!(ascii_text(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
        assert_eq!(ascii_text(&[]), "");
    }
}
