//! Byte-order reversal for typed-array payloads.

/// Reverses every `width`-byte lane of `buf` in place.
///
/// Widths of 0 or 1 leave the buffer untouched; a trailing partial lane is
/// left as is.
pub fn swap_lanes(buf: &mut [u8], width: usize) {
    if width < 2 {
        return;
    }
    for lane in buf.chunks_exact_mut(width) {
        lane.reverse();
    }
}

/// Returns a byte-swapped copy of `bytes`, leaving the input untouched.
pub fn swapped(bytes: &[u8], width: usize) -> Vec<u8> {
    let mut copy = bytes.to_vec();
    swap_lanes(&mut copy, width);
    copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap16() {
        let mut b = [1, 2, 3, 4];
        swap_lanes(&mut b, 2);
        assert_eq!(b, [2, 1, 4, 3]);
    }

    #[test]
    fn swap32() {
        let mut b = 0x0102_0304u32.to_le_bytes();
        swap_lanes(&mut b, 4);
        assert_eq!(b, 0x0102_0304u32.to_be_bytes());
    }

    #[test]
    fn swap64_twice_is_identity() {
        let original: Vec<u8> = (0..16).collect();
        let once = swapped(&original, 8);
        assert_eq!(&once[..8], &[7, 6, 5, 4, 3, 2, 1, 0]);
        assert_eq!(swapped(&once, 8), original);
    }

    #[test]
    fn single_byte_lanes_unchanged() {
        let mut b = [1, 2, 3];
        swap_lanes(&mut b, 1);
        assert_eq!(b, [1, 2, 3]);
    }
}
