//! Tag byte constants and field extractors.
//!
//! The top 3 bits of a tag select a category; the low 5 bits carry subtype
//! flags and size classes. Category 0 is a set of single-byte literals.

// Categories (tag >> 5)
pub const LITERAL: u8 = 0;
pub const NUMBER: u8 = 1;
pub const BIGINT: u8 = 2;
pub const STRING: u8 = 3;
pub const COLLECTION: u8 = 4;
pub const SPARSE: u8 = 5;
pub const TYPED: u8 = 6;
pub const RESERVED: u8 = 7;

// Inline literals
pub const NULL: u8 = 0;
pub const UNDEFINED: u8 = 1;
pub const TRUE: u8 = 2;
pub const BOXED_TRUE: u8 = 3;
pub const FALSE: u8 = 4;
pub const BOXED_FALSE: u8 = 5;
pub const INFINITY: u8 = 6;
pub const BOXED_INFINITY: u8 = 7;
pub const NEG_INFINITY: u8 = 8;
pub const BOXED_NEG_INFINITY: u8 = 9;
pub const NAN: u8 = 10;
pub const BOXED_NAN: u8 = 11;
pub const HOLE: u8 = 12;
pub const UNSUPPORTED: u8 = 13;

// Literal-category tags followed by a payload
pub const DATE: u8 = 14;
pub const REGEXP: u8 = 15;
pub const REFERENCE: u8 = 29;

// Number / big integer flags
pub const BOXED: u8 = 1 << 4;
pub const NEGATIVE: u8 = 1 << 3;

// String subtypes (bits 3..=4)
pub const TEXT: u8 = 0;
pub const BOXED_TEXT: u8 = 1;
pub const BUFFER: u8 = 2;
pub const SHARED_BUFFER: u8 = 3;

// Collection subtypes (bits 3..=4)
pub const ARRAY: u8 = 0;
pub const RECORD: u8 = 1;
pub const MAP: u8 = 2;
pub const SET: u8 = 3;

// Sparse array mode: clear = hole markers, set = index/value pairs
pub const INDEXED: u8 = 1 << 4;

// Typed array byte order
pub const BIG_ENDIAN: u8 = 1 << 4;

/// Width in bytes of the float payload of a number tag.
pub const FLOAT_WIDTH: usize = 8;

/// Largest integer a number tag stores as an integer (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Builds a tag from a category and its low 5 bits.
pub const fn tag(category: u8, low: u8) -> u8 {
    category << 5 | (low & 0x1F)
}

pub const fn category(tag: u8) -> u8 {
    tag >> 5
}

/// Width of the size field encoded in the low 3 bits.
pub const fn width(tag: u8) -> usize {
    (tag & 0x07) as usize + 1
}

/// The 2-bit subtype of string and collection tags.
pub const fn subtype(tag: u8) -> u8 {
    tag >> 3 & 0x03
}

/// Size-class field for a size of `width` bytes.
pub const fn size_class(width: usize) -> u8 {
    (width - 1) as u8
}

/// Widths of the length and count fields of a sparse array tag.
pub const fn sparse_widths(tag: u8) -> (usize, usize) {
    ((tag >> 2 & 0x03) as usize + 1, (tag & 0x03) as usize + 1)
}

/// An unboxed, non-negative number tag (array indices, offsets).
pub const fn is_natural(tag: u8) -> bool {
    category(tag) == NUMBER && tag & (BOXED | NEGATIVE) == 0
}

/// An unboxed string tag (record keys, regexp literals).
pub const fn is_text(tag: u8) -> bool {
    category(tag) == STRING && subtype(tag) == TEXT
}

/// A buffer or shared buffer tag.
pub const fn is_buffer(tag: u8) -> bool {
    category(tag) == STRING && subtype(tag) >= BUFFER
}

/// An unboxed number or NaN tag (date payloads).
pub const fn is_time(tag: u8) -> bool {
    (category(tag) == NUMBER && tag & BOXED == 0) || tag == NAN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_layout() {
        assert_eq!(tag(NUMBER, 1), 0x21);
        assert_eq!(tag(STRING, 0), 0x60);
        assert_eq!(category(0xA5), SPARSE);
        assert_eq!(width(0x27), 8);
        assert_eq!(subtype(tag(COLLECTION, MAP << 3)), MAP);
        assert_eq!(sparse_widths(0xB4), (2, 1));
    }

    #[test]
    fn payload_predicates() {
        assert!(is_natural(0x20));
        assert!(!is_natural(0x28));
        assert!(!is_natural(0x30));
        assert!(is_text(0x60));
        assert!(!is_text(0x68));
        assert!(is_buffer(0x70));
        assert!(is_buffer(0x78));
        assert!(is_time(NAN));
        assert!(is_time(0x2F));
        assert!(!is_time(0x30));
    }
}
