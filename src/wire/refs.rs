//! Reference tables for shared and cyclic structure.
//!
//! The encoder maps an object's handle to the stream offset of its first
//! tag; the decoder maps that offset back to the materialized value. Both
//! live for exactly one encode or decode operation.

use std::collections::HashMap;

use crate::types::{ObjectId, Value};

/// Encode side: object handle to first-seen stream offset.
#[derive(Debug, Default)]
pub struct EncodeRefs {
    offsets: HashMap<ObjectId, u64>,
}

impl EncodeRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` at `offset` unless already seen. Returns the earlier
    /// offset when the object was seen before.
    pub fn visit(&mut self, id: ObjectId, offset: u64) -> Option<u64> {
        match self.offsets.get(&id) {
            Some(&earlier) => Some(earlier),
            None => {
                self.offsets.insert(id, offset);
                None
            }
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<u64> {
        self.offsets.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Decode side: stream offset to the value materialized there.
#[derive(Debug, Default)]
pub struct DecodeRefs {
    values: HashMap<u64, Value>,
}

impl DecodeRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, offset: u64, value: Value) {
        debug_assert!(
            !self.values.contains_key(&offset),
            "offset {offset} registered twice"
        );
        self.values.insert(offset, value);
    }

    pub fn resolve(&self, offset: u64) -> Option<&Value> {
        self.values.get(&offset)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
