//! Minimal-width little-endian unsigned integers.
//!
//! Sizes are stored in 1 to 8 bytes, the width itself living in the tag.
//! Big-integer magnitudes use the same layout with no upper bound.

use bytes::{Buf, BufMut};

/// Bytes needed to hold `n`, at least 1.
pub fn uint_width(n: u64) -> usize {
    (8 - n.leading_zeros() as usize / 8).max(1)
}

/// Encodes `n` in the fewest bytes, least significant first.
pub fn encode_uint(n: u64) -> Vec<u8> {
    n.to_le_bytes()[..uint_width(n)].to_vec()
}

/// Writes `n` with its minimal width and returns that width.
pub fn put_uint(buf: &mut impl BufMut, n: u64) -> usize {
    let width = uint_width(n);
    buf.put_uint_le(n, width);
    width
}

/// Decodes up to 8 little-endian bytes.
pub fn decode_uint(mut bytes: &[u8]) -> u64 {
    debug_assert!(bytes.len() <= 8, "uint fields are at most 8 bytes");
    let width = bytes.len();
    bytes.get_uint_le(width)
}

/// Encodes a magnitude given as little-endian bytes, dropping high zero bytes.
///
/// Zero encodes as a single `0x00` byte.
pub fn encode_biguint(magnitude: &[u8]) -> Vec<u8> {
    let used = magnitude.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
    let mut out = vec![0u8; used];
    let copied = used.min(magnitude.len());
    out[..copied].copy_from_slice(&magnitude[..copied]);
    out
}

/// Decodes a little-endian magnitude, dropping high zero bytes.
pub fn decode_biguint(bytes: &[u8]) -> Vec<u8> {
    let used = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    bytes[..used].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(uint_width(0), 1);
        assert_eq!(uint_width(255), 1);
        assert_eq!(uint_width(256), 2);
        assert_eq!(uint_width(65_535), 2);
        assert_eq!(uint_width(1 << 24), 4);
        assert_eq!(uint_width(u64::MAX), 8);
    }

    #[test]
    fn encode_minimal() {
        assert_eq!(encode_uint(0), [0x00]);
        assert_eq!(encode_uint(256), [0x00, 0x01]);
        assert_eq!(encode_uint(0x0102_0304), [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn decode_inverse() {
        for n in [0, 1, 255, 256, 70_000, 1 << 40, u64::MAX] {
            assert_eq!(decode_uint(&encode_uint(n)), n, "failed for {n}");
        }
        assert_eq!(decode_uint(&[0x00, 0x01, 0x00]), 256);
    }

    #[test]
    fn put_reports_width() {
        let mut buf = Vec::new();
        assert_eq!(put_uint(&mut buf, 300), 2);
        assert_eq!(buf, [0x2C, 0x01]);
    }

    #[test]
    fn biguint_trims() {
        assert_eq!(encode_biguint(&[]), [0x00]);
        assert_eq!(encode_biguint(&[0, 0]), [0x00]);
        assert_eq!(encode_biguint(&[1, 2, 0]), [1, 2]);
        assert_eq!(decode_biguint(&[0x00]), Vec::<u8>::new());
        assert_eq!(decode_biguint(&[5, 0, 0]), [5]);
    }
}
