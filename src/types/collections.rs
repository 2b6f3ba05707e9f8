//! Ordered collection types: arrays with holes, records, maps and sets.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{BigInt, ObjectId, Value};

/// An array whose absent slots below `len` are holes.
///
/// Only present elements are stored, so a declared length never allocates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array {
    len: u32,
    slots: BTreeMap<u32, Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// An array of `len` holes.
    pub fn with_len(len: u32) -> Self {
        Self {
            len,
            slots: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots that hold a value.
    pub fn present_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether every slot below `len` holds a value.
    pub fn is_dense(&self) -> bool {
        self.slots.len() == self.len as usize
    }

    /// Appends a value.
    ///
    /// # Panics
    ///
    /// Panics if the array already holds `u32::MAX` slots.
    pub fn push(&mut self, value: Value) {
        let index = self.len;
        self.len = self.len.checked_add(1).expect("array length overflow");
        self.slots.insert(index, value);
    }

    /// Stores a value, growing the length to cover `index`.
    pub fn set(&mut self, index: u32, value: Value) -> Option<Value> {
        self.len = self.len.max(index.saturating_add(1));
        self.slots.insert(index, value)
    }

    pub fn get(&self, index: u32) -> Option<&Value> {
        self.slots.get(&index)
    }

    pub fn has(&self, index: u32) -> bool {
        self.slots.contains_key(&index)
    }

    pub fn is_hole(&self, index: u32) -> bool {
        index < self.len && !self.has(index)
    }

    /// Removes the element at `index`, leaving a hole.
    pub fn remove(&mut self, index: u32) -> Option<Value> {
        self.slots.remove(&index)
    }

    /// Changes the length, dropping elements at or beyond it.
    pub fn set_len(&mut self, len: u32) {
        self.slots.split_off(&len);
        self.len = len;
    }

    /// Present elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.slots.iter().map(|(i, v)| (*i, v))
    }

    /// The first present element at or after `index`.
    pub fn next_from(&self, index: u32) -> Option<(u32, &Value)> {
        self.slots.range(index..).next().map(|(i, v)| (*i, v))
    }

    /// Highest present index plus one, or zero when nothing is present.
    pub fn slot_span(&self) -> u32 {
        self.slots
            .last_key_value()
            .map_or(0, |(i, _)| i.saturating_add(1))
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        let mut array = Self::new();
        for item in items {
            array.push(item);
        }
        array
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut array = Self::new();
        for item in iter {
            array.push(item);
        }
        array
    }
}

/// A plain string-keyed object with insertion-ordered keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or overwrites a property; an overwrite keeps the key's position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }
}

/// Hashable form of a value under SameValueZero equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Null,
    Undefined,
    Boolean(bool),
    Number(u64),
    BigInt(BigInt),
    String(String),
    Object(ObjectId),
}

impl From<&Value> for MapKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Undefined => Self::Undefined,
            Value::Boolean(b) => Self::Boolean(*b),
            Value::Number(n) if n.is_nan() => Self::Number(f64::NAN.to_bits()),
            Value::Number(n) if *n == 0.0 => Self::Number(0),
            Value::Number(n) => Self::Number(n.to_bits()),
            Value::BigInt(b) => Self::BigInt(b.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Object(id) => Self::Object(*id),
        }
    }
}

/// An insertion-ordered map with keys of any kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    entries: Vec<(Value, Value)>,
    index: HashMap<MapKey, usize>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or overwrites an entry; an overwrite keeps the key's position.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let hashed = MapKey::from(&key);
        if let Some(&i) = self.index.get(&hashed) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(hashed, self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.index
            .get(&MapKey::from(key))
            .map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(&MapKey::from(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// An insertion-ordered set of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Set {
    values: Vec<Value>,
    index: HashSet<MapKey>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Adds a value. Returns `false` if an equal value was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        if !self.index.insert(MapKey::from(&value)) {
            return false;
        }
        self.values.push(value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.index.contains(&MapKey::from(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}
