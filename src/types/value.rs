//! Core value types and the object arena.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use super::{Array, Buffer, Map, Record, RegExp, Set, TypedArray};

/// A value that is never reference-tracked.
///
/// Everything with identity (collections, buffers, boxed primitives, dates,
/// regular expressions) lives in a [`Heap`] and is referred to by
/// [`Value::Object`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Undefined,
    Boolean(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
    Object(ObjectId),
}

impl Value {
    /// Returns the value as a string reference, if it is a `String` variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an f64, if it is a `Number` variant.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the object handle, if this value refers to a heap object.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// SameValueZero: NaN equals NaN, `-0` equals `+0`, objects by identity.
    pub fn same_value_zero(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self == other,
        }
    }
}

/// An arbitrary-precision integer stored as sign and little-endian magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

impl BigInt {
    /// Builds a big integer from a sign and little-endian magnitude bytes.
    pub fn from_parts(negative: bool, mut magnitude: Vec<u8>) -> Self {
        let used = magnitude.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        magnitude.truncate(used);
        Self {
            negative: negative && !magnitude.is_empty(),
            magnitude,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// Little-endian magnitude without trailing zero bytes (empty for zero).
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    pub fn to_i128(&self) -> Option<i128> {
        if self.magnitude.len() > 16 {
            return None;
        }
        let mut le = [0u8; 16];
        le[..self.magnitude.len()].copy_from_slice(&self.magnitude);
        let mag = u128::from_le_bytes(le);
        if self.negative {
            0i128.checked_sub_unsigned(mag)
        } else {
            i128::try_from(mag).ok()
        }
    }

    fn to_decimal(&self) -> String {
        let mut be: Vec<u8> = self.magnitude.iter().rev().copied().collect();
        let mut digits = Vec::new();
        while !be.is_empty() {
            let mut rem = 0u32;
            for b in be.iter_mut() {
                let cur = (rem << 8) | u32::from(*b);
                *b = (cur / 10) as u8;
                rem = cur % 10;
            }
            digits.push(b'0' + rem as u8);
            let zeros = be.iter().take_while(|&&b| b == 0).count();
            be.drain(..zeros);
        }
        if digits.is_empty() {
            digits.push(b'0');
        }
        if self.negative {
            digits.push(b'-');
        }
        digits.reverse();
        String::from_utf8_lossy(&digits).into_owned()
    }
}

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        Self::from_parts(v < 0, v.unsigned_abs().to_le_bytes().to_vec())
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        Self::from(i128::from(v))
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> Self {
        Self::from_parts(false, v.to_le_bytes().to_vec())
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}n", self.to_decimal())
    }
}

/// Stable handle of an object in a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A heap object. Every variant except `Unsupported` is reference-tracked.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    // Boxed primitives
    Boolean(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
    // Collections
    Array(Array),
    Record(Record),
    Map(Map),
    Set(Set),
    // Binary
    Buffer(Buffer),
    TypedArray(TypedArray),
    // Other built-ins
    /// Milliseconds since the Unix epoch; NaN is an invalid date.
    Date(f64),
    RegExp(RegExp),
    /// A value of a kind the codec cannot represent.
    Unsupported,
}

impl Object {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Number(_) => "Number",
            Self::BigInt(_) => "BigInt",
            Self::String(_) => "String",
            Self::Array(_) => "Array",
            Self::Record(_) => "Object",
            Self::Map(_) => "Map",
            Self::Set(_) => "Set",
            Self::Buffer(b) if b.is_shared() => "SharedArrayBuffer",
            Self::Buffer(_) => "ArrayBuffer",
            Self::TypedArray(t) => t.kind().name(),
            Self::Date(_) => "Date",
            Self::RegExp(_) => "RegExp",
            Self::Unsupported => "Unsupported",
        }
    }

    /// Whether this object is an array, record, map or set.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::Array(_) | Self::Record(_) | Self::Map(_) | Self::Set(_)
        )
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut Set> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Self::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_typed_array(&self) -> Option<&TypedArray> {
        match self {
            Self::TypedArray(t) => Some(t),
            _ => None,
        }
    }
}

/// Arena owning every object of one value graph.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves an object into the arena and returns its handle.
    pub fn alloc(&mut self, object: Object) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    /// Allocates an object and returns a value referring to it.
    pub fn insert(&mut self, object: Object) -> Value {
        Value::Object(self.alloc(object))
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().enumerate().map(|(i, o)| (ObjectId(i), o))
    }

    /// Returns the bytes a typed-array view covers, if `id` is a valid view.
    pub fn view_bytes(&self, id: ObjectId) -> Option<&[u8]> {
        let view = self.get(id)?.as_typed_array()?;
        let buffer = self.get(view.buffer())?.as_buffer()?;
        buffer.data().get(view.byte_range())
    }
}

impl Index<ObjectId> for Heap {
    type Output = Object;

    fn index(&self, id: ObjectId) -> &Object {
        &self.objects[id.0]
    }
}

impl IndexMut<ObjectId> for Heap {
    fn index_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.0]
    }
}

/// A root value together with the heap its objects live in.
#[derive(Debug, Clone)]
pub struct Document {
    pub heap: Heap,
    pub root: Value,
}

impl Document {
    pub fn new(heap: Heap, root: Value) -> Self {
        Self { heap, root }
    }

    /// A document holding a single primitive value.
    pub fn primitive(root: Value) -> Self {
        Self::new(Heap::new(), root)
    }

    /// Resolves the root to its heap object, if it is one.
    pub fn root_object(&self) -> Option<&Object> {
        self.root.as_object().and_then(|id| self.heap.get(id))
    }

    /// Structural equality that also requires the same sharing shape.
    ///
    /// Two documents are equivalent when a one-to-one mapping between their
    /// objects makes them identical. Numbers compare with `Object.is`
    /// semantics, so NaN matches NaN and `-0` differs from `+0`.
    pub fn equivalent(&self, other: &Document) -> bool {
        let mut cmp = Equivalence {
            left: &self.heap,
            right: &other.heap,
            forward: HashMap::new(),
            backward: HashMap::new(),
            pending: vec![(&self.root, &other.root)],
        };
        cmp.run()
    }
}

/// Pairwise comparison driven by a worklist, so depth never grows the
/// call stack.
struct Equivalence<'a> {
    left: &'a Heap,
    right: &'a Heap,
    forward: HashMap<ObjectId, ObjectId>,
    backward: HashMap<ObjectId, ObjectId>,
    pending: Vec<(&'a Value, &'a Value)>,
}

impl<'a> Equivalence<'a> {
    fn run(&mut self) -> bool {
        while let Some((a, b)) = self.pending.pop() {
            let same = match (a, b) {
                (Value::Number(x), Value::Number(y)) => same_number(*x, *y),
                (Value::Object(x), Value::Object(y)) => self.objects(*x, *y),
                _ => a == b,
            };
            if !same {
                return false;
            }
        }
        true
    }

    /// Compares two objects shallowly and queues their children.
    fn objects(&mut self, a: ObjectId, b: ObjectId) -> bool {
        match (self.forward.get(&a), self.backward.get(&b)) {
            (Some(&mapped), _) => return mapped == b,
            (None, Some(_)) => return false,
            (None, None) => {}
        }
        self.forward.insert(a, b);
        self.backward.insert(b, a);

        let (left, right) = (self.left, self.right);
        let (Some(x), Some(y)) = (left.get(a), right.get(b)) else {
            return false;
        };
        match (x, y) {
            (Object::Boolean(p), Object::Boolean(q)) => p == q,
            (Object::Number(p), Object::Number(q)) => same_number(*p, *q),
            (Object::BigInt(p), Object::BigInt(q)) => p == q,
            (Object::String(p), Object::String(q)) => p == q,
            (Object::Date(p), Object::Date(q)) => same_number(*p, *q),
            (Object::RegExp(p), Object::RegExp(q)) => p == q,
            (Object::Buffer(p), Object::Buffer(q)) => p == q,
            (Object::Unsupported, Object::Unsupported) => true,
            (Object::TypedArray(p), Object::TypedArray(q)) => {
                p.kind() == q.kind()
                    && left.view_bytes(a).is_some()
                    && left.view_bytes(a) == right.view_bytes(b)
            }
            (Object::Array(p), Object::Array(q)) => {
                if p.len() != q.len() || p.present_count() != q.present_count() {
                    return false;
                }
                for (i, v) in p.iter() {
                    let Some(w) = q.get(i) else {
                        return false;
                    };
                    self.pending.push((v, w));
                }
                true
            }
            (Object::Record(p), Object::Record(q)) => {
                if p.len() != q.len() {
                    return false;
                }
                for ((k1, v1), (k2, v2)) in p.iter().zip(q.iter()) {
                    if k1 != k2 {
                        return false;
                    }
                    self.pending.push((v1, v2));
                }
                true
            }
            (Object::Map(p), Object::Map(q)) => {
                if p.len() != q.len() {
                    return false;
                }
                for ((k1, v1), (k2, v2)) in p.iter().zip(q.iter()) {
                    self.pending.push((k1, k2));
                    self.pending.push((v1, v2));
                }
                true
            }
            (Object::Set(p), Object::Set(q)) => {
                if p.len() != q.len() {
                    return false;
                }
                self.pending.extend(p.iter().zip(q.iter()));
                true
            }
            _ => false,
        }
    }
}

fn same_number(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

// -- Convenience conversions --

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Number(f64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Number(f64::from(i))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Self::BigInt(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Object(id)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Undefined => write!(f, "undefined"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) if n.is_nan() => write!(f, "NaN"),
            Self::Number(n) if n.is_infinite() => {
                write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::BigInt(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(id) => write!(f, "<object {id}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_normalizes() {
        let b = BigInt::from_parts(true, vec![0, 0, 0]);
        assert!(b.is_zero());
        assert!(!b.is_negative());
        let b = BigInt::from_parts(false, vec![1, 2, 0, 0]);
        assert_eq!(b.magnitude(), &[1, 2]);
    }

    #[test]
    fn bigint_i128_round_trip() {
        for v in [0i128, 1, -1, 255, -256, i128::from(i64::MAX), i128::MIN, i128::MAX] {
            assert_eq!(BigInt::from(v).to_i128(), Some(v), "failed for {v}");
        }
        assert_eq!(BigInt::from_parts(false, vec![1; 17]).to_i128(), None);
    }

    #[test]
    fn bigint_display() {
        assert_eq!(BigInt::from(0i64).to_string(), "0n");
        assert_eq!(BigInt::from(-1234567890123i64).to_string(), "-1234567890123n");
        assert_eq!(BigInt::from(u64::MAX).to_string(), "18446744073709551615n");
    }

    #[test]
    fn same_value_zero_semantics() {
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
        assert!(Value::Number(0.0).same_value_zero(&Value::Number(-0.0)));
        assert!(!Value::Number(1.0).same_value_zero(&Value::from("1")));
    }

    #[test]
    fn heap_alloc_and_index() {
        let mut heap = Heap::new();
        let id = heap.alloc(Object::Date(0.0));
        assert_eq!(heap.len(), 1);
        assert_eq!(heap[id], Object::Date(0.0));
        assert!(heap.get(ObjectId(7)).is_none());
    }

    #[test]
    fn equivalence_tracks_sharing() {
        let mut heap = Heap::new();
        let shared = heap.insert(Object::Record(Record::new()));
        let arr = heap.insert(Object::Array(Array::from(vec![shared.clone(), shared])));
        let doc_a = Document::new(heap, arr);

        let mut heap = Heap::new();
        let first = heap.insert(Object::Record(Record::new()));
        let second = heap.insert(Object::Record(Record::new()));
        let arr = heap.insert(Object::Array(Array::from(vec![first, second])));
        let doc_b = Document::new(heap, arr);

        assert!(doc_a.equivalent(&doc_a.clone()));
        assert!(!doc_a.equivalent(&doc_b));
    }

    #[test]
    fn equivalence_distinguishes_negative_zero() {
        let a = Document::primitive(Value::Number(0.0));
        let b = Document::primitive(Value::Number(-0.0));
        assert!(!a.equivalent(&b));
        assert!(a.equivalent(&Document::primitive(Value::Number(0.0))));
    }

    #[test]
    fn equivalence_of_deep_nesting() {
        let mut heap = Heap::new();
        let mut value = Value::Null;
        for _ in 0..100_000 {
            value = heap.insert(Object::Array(Array::from(vec![value])));
        }
        let doc = Document::new(heap, value);
        let mut other = doc.clone();
        assert!(doc.equivalent(&other));

        let innermost = other.heap.iter().next().map(|(id, _)| id).unwrap();
        other.heap[innermost] = Object::Array(Array::from(vec![Value::Undefined]));
        assert!(!doc.equivalent(&other));
    }
}
