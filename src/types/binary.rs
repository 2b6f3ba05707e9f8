//! Binary buffers, typed-array views and regular expressions.

use std::ops::Range;

use super::ObjectId;
use crate::error::JossError;

/// A raw byte buffer. `shared` distinguishes a SharedArrayBuffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
    shared: bool,
}

impl Buffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            shared: false,
        }
    }

    pub fn shared(data: Vec<u8>) -> Self {
        Self { data, shared: true }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Element type of a typed-array view, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
    DataView,
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

impl TypedArrayKind {
    const ALL: [Self; 12] = [
        Self::DataView,
        Self::Int8,
        Self::Uint8,
        Self::Uint8Clamped,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Float64,
        Self::BigInt64,
        Self::BigUint64,
    ];

    /// The 4-bit kind code carried in the tag byte.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Bytes per element. A DataView has no element type and counts as 1.
    pub fn width(self) -> usize {
        match self {
            Self::DataView | Self::Int8 | Self::Uint8 | Self::Uint8Clamped => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 | Self::BigInt64 | Self::BigUint64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DataView => "DataView",
            Self::Int8 => "Int8Array",
            Self::Uint8 => "Uint8Array",
            Self::Uint8Clamped => "Uint8ClampedArray",
            Self::Int16 => "Int16Array",
            Self::Uint16 => "Uint16Array",
            Self::Int32 => "Int32Array",
            Self::Uint32 => "Uint32Array",
            Self::Float32 => "Float32Array",
            Self::Float64 => "Float64Array",
            Self::BigInt64 => "BigInt64Array",
            Self::BigUint64 => "BigUint64Array",
        }
    }
}

/// A typed view over a byte range of a [`Buffer`] object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedArray {
    kind: TypedArrayKind,
    buffer: ObjectId,
    byte_offset: usize,
    byte_length: usize,
}

impl TypedArray {
    /// A view spanning `byte_length` bytes from the start of `buffer`.
    pub fn new(kind: TypedArrayKind, buffer: ObjectId, byte_length: usize) -> Self {
        Self::with_range(kind, buffer, 0, byte_length)
    }

    pub fn with_range(
        kind: TypedArrayKind,
        buffer: ObjectId,
        byte_offset: usize,
        byte_length: usize,
    ) -> Self {
        Self {
            kind,
            buffer,
            byte_offset,
            byte_length,
        }
    }

    pub fn kind(&self) -> TypedArrayKind {
        self.kind
    }

    pub fn buffer(&self) -> ObjectId {
        self.buffer
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.byte_offset..self.byte_offset + self.byte_length
    }

    /// Number of elements in the view.
    pub fn len(&self) -> usize {
        self.byte_length / self.kind.width()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_length == 0
    }

    /// Whether this view fits inside a buffer of `buffer_len` bytes and
    /// covers a whole number of elements.
    pub fn fits(&self, buffer_len: usize) -> bool {
        self.byte_offset
            .checked_add(self.byte_length)
            .is_some_and(|end| end <= buffer_len)
            && self.byte_length % self.kind.width() == 0
    }
}

const REGEXP_FLAGS: &str = "dgimsuvy";

/// A regular expression kept as source text and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegExp {
    source: String,
    flags: String,
}

impl RegExp {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// The `/source/flags` literal form.
    pub fn to_literal(&self) -> String {
        let source = if self.source.is_empty() {
            "(?:)"
        } else {
            &self.source
        };
        format!("/{source}/{}", self.flags)
    }

    /// Parses a `/source/flags` literal. Only delimiters and flags are checked.
    pub fn parse_literal(literal: &str) -> Result<Self, JossError> {
        let close = literal.rfind('/').unwrap_or(0);
        if !literal.starts_with('/') || close == 0 {
            return Err(JossError::malformed(format!(
                "regexp literal lacks delimiters: {literal:?}"
            )));
        }
        let flags = &literal[close + 1..];
        for (i, c) in flags.char_indices() {
            if !REGEXP_FLAGS.contains(c) || flags[..i].contains(c) {
                return Err(JossError::malformed(format!(
                    "invalid regexp flags: {flags:?}"
                )));
            }
        }
        Ok(Self::new(&literal[1..close], flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_follow_wire_order() {
        assert_eq!(TypedArrayKind::DataView.code(), 0);
        assert_eq!(TypedArrayKind::Float32.code(), 8);
        assert_eq!(TypedArrayKind::BigUint64.code(), 11);
        assert_eq!(TypedArrayKind::from_code(4), Some(TypedArrayKind::Int16));
        assert_eq!(TypedArrayKind::from_code(12), None);
    }

    #[test]
    fn view_fit() {
        let mut heap = crate::types::Heap::new();
        let buf = heap.alloc(crate::types::Object::Buffer(Buffer::new(vec![0; 8])));
        assert!(TypedArray::new(TypedArrayKind::Int32, buf, 8).fits(8));
        assert!(!TypedArray::new(TypedArrayKind::Int32, buf, 6).fits(8));
        assert!(!TypedArray::with_range(TypedArrayKind::Uint8, buf, 4, 8).fits(8));
        assert_eq!(TypedArray::new(TypedArrayKind::Float64, buf, 8).len(), 1);
    }

    #[test]
    fn regexp_literal_round_trip() {
        let re = RegExp::new("a/b+", "gi");
        assert_eq!(re.to_literal(), "/a/b+/gi");
        assert_eq!(RegExp::parse_literal("/a/b+/gi").unwrap(), re);
        assert_eq!(RegExp::new("", "").to_literal(), "/(?:)/");
    }

    #[test]
    fn regexp_rejects_bad_literals() {
        for bad in ["abc", "/", "/x/q", "/x/gg", ""] {
            assert!(RegExp::parse_literal(bad).is_err(), "accepted {bad:?}");
        }
    }
}
