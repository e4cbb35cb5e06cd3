//! Modified UTF-8, the string encoding of class-file constants and of
//! `DataInput.readUTF` / `DataOutput.writeUTF`.
//!
//! Strings are encoded as UTF-16 code units: NUL takes the two byte form
//! `C0 80` and supplementary characters are written as two three byte
//! surrogates instead of one four byte sequence.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed modified UTF-8 at byte {offset}")]
pub struct Mutf8Error {
    pub offset: usize,
}

pub fn decode(bytes: &[u8]) -> Result<String, Mutf8Error> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        let lead = bytes[pos];
        let (unit, width) = match lead {
            0x00..=0x7F => (u16::from(lead), 1),
            0xC0..=0xDF => {
                let low = continuation(bytes, pos + 1)?;
                ((u16::from(lead & 0x1F) << 6) | low, 2)
            }
            0xE0..=0xEF => {
                let mid = continuation(bytes, pos + 1)?;
                let low = continuation(bytes, pos + 2)?;
                ((u16::from(lead & 0x0F) << 12) | (mid << 6) | low, 3)
            }
            _ => return Err(Mutf8Error { offset: pos }),
        };
        units.push(unit);
        pos += width;
    }
    // Unpaired surrogates have no `String` representation.
    String::from_utf16(&units).map_err(|_| Mutf8Error { offset: 0 })
}

pub fn encode(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.extend([0xC0 | (unit >> 6) as u8, 0x80 | (unit & 0x3F) as u8]);
            }
            _ => out.extend([
                0xE0 | (unit >> 12) as u8,
                0x80 | ((unit >> 6) & 0x3F) as u8,
                0x80 | (unit & 0x3F) as u8,
            ]),
        }
    }
    out
}

fn continuation(bytes: &[u8], pos: usize) -> Result<u16, Mutf8Error> {
    match bytes.get(pos) {
        Some(&byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
        _ => Err(Mutf8Error { offset: pos }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nul_uses_two_byte_form() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
    }

    #[test]
    fn test_supplementary_character_as_surrogate_pair() {
        let bytes = encode("Foo\u{1F600}");
        assert_eq!(&bytes[3..], &[0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode(&bytes).unwrap(), "Foo\u{1F600}");
    }

    #[test]
    fn test_bmp_text_matches_utf8() {
        let name = "com/example/Größe";
        assert_eq!(encode(name), name.as_bytes());
        assert_eq!(decode(name.as_bytes()).unwrap(), name);
    }

    #[test]
    fn test_four_byte_sequence_rejected() {
        let err = decode("\u{1F600}".as_bytes()).unwrap_err();
        assert_eq!(err, Mutf8Error { offset: 0 });
    }

    #[test]
    fn test_truncated_sequence_rejected() {
        let err = decode(&[b'a', 0xE0, 0x80]).unwrap_err();
        assert_eq!(err, Mutf8Error { offset: 3 });
    }

    #[test]
    fn test_unpaired_surrogate_rejected() {
        assert!(decode(&[0xED, 0xA0, 0xBD]).is_err());
    }
}
