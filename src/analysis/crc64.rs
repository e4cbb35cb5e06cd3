//! CRC64 class ids, as computed by the JaCoCo agent.
//!
//! Reflected ECMA-182 polynomial, zero initial value, no final xor.

const POLY64REV: u64 = 0xD800_0000_0000_0000;

const LOOKUP_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut v = i as u64;
        let mut j = 0;
        while j < 8 {
            if v & 1 == 1 {
                v = (v >> 1) ^ POLY64REV;
            } else {
                v >>= 1;
            }
            j += 1;
        }
        table[i] = v;
        i += 1;
    }
    table
}

fn update(sum: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(sum, |sum, &b| (sum >> 8) ^ LOOKUP_TABLE[((sum ^ u64::from(b)) & 0xff) as usize])
}

pub fn checksum(bytes: &[u8]) -> u64 {
    update(0, bytes)
}

/// Id of a class file. Java 9 class files (major 53) hash as if their
/// major version were 52, matching the agent.
pub fn class_id(bytes: &[u8]) -> u64 {
    const V1_8: u8 = 52;
    const V9: u8 = 53;
    if bytes.len() > 7 && bytes[6] == 0x00 && bytes[7] == V9 {
        let sum = update(0, &bytes[..7]);
        let sum = update(sum, &[V1_8]);
        return update(sum, &bytes[8..]);
    }
    checksum(bytes)
}
