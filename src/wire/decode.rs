//! Value decoding: bytes → `Value` graph.
//!
//! Every leaf decoder checks that its whole encoding is buffered before it
//! consumes anything, so an `Ended` error always leaves the cursor where the
//! attempt started. The streaming decoder relies on this to retry a value
//! once more bytes arrive.

use super::marker;
use super::refs::DecodeRefs;
use super::swap::swapped;
use super::varint::{decode_biguint, decode_uint};
use crate::error::JossError;
use crate::options::Endian;
use crate::types::{
    Array, BigInt, Buffer, Document, Heap, Map, Object, ObjectId, Record, RegExp, Set,
    TypedArray, TypedArrayKind, Value,
};

type Result<T> = std::result::Result<T, JossError>;

/// Outcome of decoding one tag.
#[derive(Debug)]
pub(crate) enum Item {
    Value(Value),
    /// The hole marker of a sparse array.
    Hole,
    /// A collection header sits at the cursor and nothing was consumed.
    Collection,
}

/// A decoded collection header. The container is already allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Header {
    Array { len: u32 },
    Holes { slots: u32 },
    Pairs { count: u32 },
    Record { count: u64 },
    Map { count: u64 },
    Set { count: u64 },
}

impl Header {
    /// Number of children that follow the header.
    pub fn count(&self) -> u64 {
        match *self {
            Self::Array { len } => u64::from(len),
            Self::Holes { slots } => u64::from(slots),
            Self::Pairs { count } => u64::from(count),
            Self::Record { count } | Self::Map { count } | Self::Set { count } => count,
        }
    }
}

/// Where a decoded child is stored in its container.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Index(u32),
    Key(String),
    Entry(Value),
    Member,
}

/// Cursor over a byte slice that materializes values into a heap.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    offset: u64,
    heap: &'a mut Heap,
    refs: &'a mut DecodeRefs,
    native: Endian,
}

impl<'a> Reader<'a> {
    /// A reader over `bytes`, whose first byte sits at stream offset `base`.
    pub fn new(
        bytes: &'a [u8],
        base: u64,
        heap: &'a mut Heap,
        refs: &'a mut DecodeRefs,
    ) -> Self {
        Self {
            bytes,
            cursor: 0,
            offset: base,
            heap,
            refs,
            native: Endian::native(),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Stream offset of the byte at the cursor.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn peek(&self) -> Result<u8> {
        self.bytes.get(self.cursor).copied().ok_or(JossError::Ended)
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
        self.offset += n as u64;
    }

    fn retreat(&mut self) {
        self.cursor -= 1;
        self.offset -= 1;
    }

    /// `len` bytes starting `skip` bytes past the cursor.
    fn span(&self, skip: usize, len: u64) -> Result<&'a [u8]> {
        let bytes = self.bytes;
        let len = usize::try_from(len).map_err(|_| JossError::Ended)?;
        let start = self.cursor + skip;
        let end = start.checked_add(len).ok_or(JossError::Ended)?;
        bytes.get(start..end).ok_or(JossError::Ended)
    }

    fn register_id(&mut self, offset: u64, object: Object) -> ObjectId {
        let id = self.heap.alloc(object);
        self.refs.register(offset, Value::Object(id));
        id
    }

    fn register(&mut self, offset: u64, object: Object) -> Value {
        Value::Object(self.register_id(offset, object))
    }

    /// Decodes the value at the cursor; a hole is malformed here.
    pub fn decode_value(&mut self) -> Result<Value> {
        match self.decode_data()? {
            Item::Value(value) => Ok(value),
            Item::Hole => Err(JossError::malformed("hole outside a sparse array")),
            Item::Collection => Err(JossError::malformed("unexpected collection header")),
        }
    }

    /// Decodes one tag and its payload.
    pub fn decode_data(&mut self) -> Result<Item> {
        let byte = self.peek()?;
        let offset = self.offset;
        let value = match byte {
            marker::NULL => self.literal(Value::Null),
            marker::UNDEFINED => self.literal(Value::Undefined),
            marker::TRUE => self.literal(Value::Boolean(true)),
            marker::FALSE => self.literal(Value::Boolean(false)),
            marker::INFINITY => self.literal(Value::Number(f64::INFINITY)),
            marker::NEG_INFINITY => self.literal(Value::Number(f64::NEG_INFINITY)),
            marker::NAN => self.literal(Value::Number(f64::NAN)),
            marker::BOXED_TRUE => self.boxed_literal(Object::Boolean(true)),
            marker::BOXED_FALSE => self.boxed_literal(Object::Boolean(false)),
            marker::BOXED_INFINITY => self.boxed_literal(Object::Number(f64::INFINITY)),
            marker::BOXED_NEG_INFINITY => {
                self.boxed_literal(Object::Number(f64::NEG_INFINITY))
            }
            marker::BOXED_NAN => self.boxed_literal(Object::Number(f64::NAN)),
            marker::HOLE => {
                self.advance(1);
                return Ok(Item::Hole);
            }
            marker::UNSUPPORTED => {
                self.advance(1);
                self.heap.insert(Object::Unsupported)
            }
            marker::DATE => self.decode_date()?,
            marker::REGEXP => self.decode_regexp()?,
            marker::REFERENCE => self.decode_reference()?,
            0..=31 => {
                return Err(JossError::malformed(format!(
                    "reserved tag {byte:#04x} at offset {offset}"
                )));
            }
            _ => match marker::category(byte) {
                marker::NUMBER => self.decode_number(byte)?,
                marker::BIGINT => self.decode_bigint(byte)?,
                marker::STRING => self.decode_string(byte)?,
                marker::COLLECTION | marker::SPARSE => return Ok(Item::Collection),
                marker::TYPED => self.decode_typed_array(byte)?,
                _ => {
                    return Err(JossError::malformed(format!(
                        "reserved category in tag {byte:#04x} at offset {offset}"
                    )));
                }
            },
        };
        Ok(Item::Value(value))
    }

    fn literal(&mut self, value: Value) -> Value {
        self.advance(1);
        value
    }

    fn boxed_literal(&mut self, object: Object) -> Value {
        let offset = self.offset;
        self.advance(1);
        self.register(offset, object)
    }

    /// Reads a number tag and payload, ignoring the boxed flag.
    fn read_number(&mut self, byte: u8) -> Result<f64> {
        let width = marker::width(byte);
        let payload = self.span(1, width as u64)?;
        let number = if width < marker::FLOAT_WIDTH {
            if width == 7 && payload[6] > 31 {
                return Err(JossError::malformed(format!(
                    "integer beyond 2^53 at offset {}",
                    self.offset
                )));
            }
            let magnitude = decode_uint(payload) as f64;
            if byte & marker::NEGATIVE != 0 {
                -magnitude
            } else {
                magnitude
            }
        } else {
            let mut le = [0u8; 8];
            le.copy_from_slice(payload);
            f64::from_le_bytes(le)
        };
        self.advance(1 + width);
        Ok(number)
    }

    fn decode_number(&mut self, byte: u8) -> Result<Value> {
        let offset = self.offset;
        let number = self.read_number(byte)?;
        if byte & marker::BOXED != 0 {
            Ok(self.register(offset, Object::Number(number)))
        } else {
            Ok(Value::Number(number))
        }
    }

    fn decode_bigint(&mut self, byte: u8) -> Result<Value> {
        let offset = self.offset;
        let width = marker::width(byte);
        let size = decode_uint(self.span(1, width as u64)?);
        let data = self.span(1 + width, size)?;
        self.advance(1 + width + data.len());
        let value = BigInt::from_parts(byte & marker::NEGATIVE != 0, decode_biguint(data));
        if byte & marker::BOXED != 0 {
            Ok(self.register(offset, Object::BigInt(value)))
        } else {
            Ok(Value::BigInt(value))
        }
    }

    /// Reads a length-prefixed payload under a string-category tag.
    fn read_blob(&mut self, byte: u8) -> Result<&'a [u8]> {
        let width = marker::width(byte);
        let len = decode_uint(self.span(1, width as u64)?);
        let data = self.span(1 + width, len)?;
        self.advance(1 + width + data.len());
        Ok(data)
    }

    fn decode_string(&mut self, byte: u8) -> Result<Value> {
        let offset = self.offset;
        let data = self.read_blob(byte)?;
        let value = match marker::subtype(byte) {
            marker::TEXT => Value::String(String::from_utf8_lossy(data).into_owned()),
            marker::BOXED_TEXT => {
                let text = String::from_utf8_lossy(data).into_owned();
                self.register(offset, Object::String(text))
            }
            marker::BUFFER => self.register(offset, Object::Buffer(Buffer::new(data.to_vec()))),
            _ => self.register(offset, Object::Buffer(Buffer::shared(data.to_vec()))),
        };
        Ok(value)
    }

    /// Reads an unboxed string, failing unless the tag is one.
    fn read_text(&mut self) -> Result<String> {
        let byte = self.peek()?;
        if !marker::is_text(byte) {
            return Err(JossError::malformed(format!(
                "expected a string at offset {}, found tag {byte:#04x}",
                self.offset
            )));
        }
        let data = self.read_blob(byte)?;
        Ok(String::from_utf8_lossy(data).into_owned())
    }

    /// Reads a non-negative integral number (indices and offsets).
    fn read_natural(&mut self) -> Result<u64> {
        let byte = self.peek()?;
        let offset = self.offset;
        if !marker::is_natural(byte) {
            return Err(JossError::malformed(format!(
                "expected a natural number at offset {offset}, found tag {byte:#04x}"
            )));
        }
        let number = self.read_number(byte)?;
        if number.fract() != 0.0 || !(0.0..=marker::MAX_SAFE_INTEGER).contains(&number) {
            return Err(JossError::malformed(format!(
                "{number} at offset {offset} is not a natural number"
            )));
        }
        Ok(number as u64)
    }

    /// Undoes the one-byte advance over a payload-carrying literal tag when
    /// its payload is incomplete.
    fn rewind_if_ended<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(result, Err(JossError::Ended)) {
            self.retreat();
        }
        result
    }

    fn decode_date(&mut self) -> Result<Value> {
        let offset = self.offset;
        self.advance(1);
        let time = self.read_time();
        let time = self.rewind_if_ended(time)?;
        Ok(self.register(offset, Object::Date(time)))
    }

    fn read_time(&mut self) -> Result<f64> {
        let byte = self.peek()?;
        if !marker::is_time(byte) {
            return Err(JossError::malformed(format!(
                "expected a time value at offset {}, found tag {byte:#04x}",
                self.offset
            )));
        }
        if byte == marker::NAN {
            self.advance(1);
            return Ok(f64::NAN);
        }
        self.read_number(byte)
    }

    fn decode_regexp(&mut self) -> Result<Value> {
        let offset = self.offset;
        self.advance(1);
        let literal = self.read_text();
        let literal = self.rewind_if_ended(literal)?;
        let regexp = RegExp::parse_literal(&literal)?;
        Ok(self.register(offset, Object::RegExp(regexp)))
    }

    fn decode_reference(&mut self) -> Result<Value> {
        self.advance(1);
        let target = self.read_natural();
        let target = self.rewind_if_ended(target)?;
        self.refs.resolve(target).cloned().ok_or_else(|| {
            JossError::malformed(format!("back-reference to unresolved offset {target}"))
        })
    }

    fn decode_typed_array(&mut self, byte: u8) -> Result<Value> {
        let offset = self.offset;
        self.advance(1);
        let buffer = self.read_backing();
        let buffer = self.rewind_if_ended(buffer)?;

        let kind = TypedArrayKind::from_code(byte & 0x0F).ok_or_else(|| {
            JossError::malformed(format!("unknown typed array kind in tag {byte:#04x}"))
        })?;
        let Some(source) = self.heap.get(buffer).and_then(Object::as_buffer) else {
            return Err(JossError::malformed(format!(
                "typed array at offset {offset} is not backed by a buffer"
            )));
        };
        let (len, width) = (source.len(), kind.width());
        if len % width != 0 {
            return Err(JossError::malformed(format!(
                "{len} bytes do not hold whole {} elements",
                kind.name()
            )));
        }

        let big = byte & marker::BIG_ENDIAN != 0;
        let copy = (width > 1 && big != self.native.is_big()).then(|| {
            let data = swapped(source.data(), width);
            if source.is_shared() {
                Buffer::shared(data)
            } else {
                Buffer::new(data)
            }
        });
        let backing = match copy {
            Some(copy) => self.heap.alloc(Object::Buffer(copy)),
            None => buffer,
        };
        Ok(self.register(
            offset,
            Object::TypedArray(TypedArray::new(kind, backing, len)),
        ))
    }

    /// Reads the buffer behind a typed array: a buffer tag or a reference.
    fn read_backing(&mut self) -> Result<ObjectId> {
        let byte = self.peek()?;
        if !(marker::is_buffer(byte) || byte == marker::REFERENCE) {
            return Err(JossError::malformed(format!(
                "expected a buffer at offset {}, found tag {byte:#04x}",
                self.offset
            )));
        }
        let value = self.decode_value()?;
        value
            .as_object()
            .ok_or_else(|| JossError::malformed("typed array payload is not an object"))
    }

    /// Decodes a collection header, allocates and registers its container
    /// and consumes the header bytes.
    pub fn decode_header(&mut self) -> Result<(ObjectId, Header)> {
        let byte = self.peek()?;
        let offset = self.offset;
        let (header, used) = match marker::category(byte) {
            marker::COLLECTION => {
                let width = marker::width(byte);
                let count = decode_uint(self.span(1, width as u64)?);
                let header = match marker::subtype(byte) {
                    marker::ARRAY => Header::Array {
                        len: u32::try_from(count).map_err(|_| {
                            JossError::malformed(format!("array length {count} is too large"))
                        })?,
                    },
                    marker::RECORD => Header::Record { count },
                    marker::MAP => Header::Map { count },
                    _ => Header::Set { count },
                };
                (header, 1 + width)
            }
            marker::SPARSE => {
                let (len_width, count_width) = marker::sparse_widths(byte);
                let len = decode_uint(self.span(1, len_width as u64)?);
                let count = decode_uint(self.span(1 + len_width, count_width as u64)?);
                let Ok(len) = u32::try_from(len) else {
                    return Err(JossError::malformed(format!(
                        "sparse array length {len} is too large"
                    )));
                };
                if count > u64::from(len) {
                    return Err(JossError::malformed(format!(
                        "sparse array at offset {offset} has {count} entries for length {len}"
                    )));
                }
                let count = count as u32;
                let header = if byte & marker::INDEXED != 0 {
                    Header::Pairs { count }
                } else {
                    Header::Holes { slots: count }
                };
                let id = self.register_id(offset, Object::Array(Array::with_len(len)));
                self.advance(1 + len_width + count_width);
                return Ok((id, header));
            }
            _ => {
                return Err(JossError::malformed(format!(
                    "expected a collection at offset {offset}, found tag {byte:#04x}"
                )));
            }
        };
        let object = match header {
            Header::Array { len } => Object::Array(Array::with_len(len)),
            Header::Record { .. } => Object::Record(Record::new()),
            Header::Map { .. } => Object::Map(Map::new()),
            _ => Object::Set(Set::new()),
        };
        let id = self.register_id(offset, object);
        self.advance(used);
        Ok((id, header))
    }

    /// Reads a record key, rejecting one the record already holds.
    pub fn read_property_key(&mut self, record: ObjectId) -> Result<String> {
        let offset = self.offset;
        let key = self.read_text()?;
        let taken = self
            .heap
            .get(record)
            .and_then(Object::as_record)
            .is_some_and(|r| r.contains_key(&key));
        if taken {
            return Err(JossError::malformed(format!(
                "duplicate key {key:?} at offset {offset}"
            )));
        }
        Ok(key)
    }

    /// Reads a sparse index, rejecting one out of range or already present.
    pub fn read_index(&mut self, array: ObjectId) -> Result<u32> {
        let offset = self.offset;
        let index = self.read_natural()?;
        let valid = self
            .heap
            .get(array)
            .and_then(Object::as_array)
            .is_some_and(|a| index < u64::from(a.len()) && !a.has(index as u32));
        if !valid {
            return Err(JossError::malformed(format!(
                "invalid sparse index {index} at offset {offset}"
            )));
        }
        Ok(index as u32)
    }

    /// Rejects a map key equal to one already present.
    pub fn check_map_key(&self, map: ObjectId, key: &Value) -> Result<()> {
        let taken = self
            .heap
            .get(map)
            .and_then(Object::as_map)
            .is_some_and(|m| m.contains_key(key));
        if taken {
            return Err(JossError::malformed(format!("duplicate map key {key}")));
        }
        Ok(())
    }

    /// Stores a decoded child in its container.
    pub fn attach(&mut self, parent: ObjectId, slot: Slot, value: Value) -> Result<()> {
        let Some(container) = self.heap.get_mut(parent) else {
            return Err(JossError::malformed(format!("no container {parent}")));
        };
        match (container, slot) {
            (Object::Array(array), Slot::Index(index)) => {
                array.set(index, value);
            }
            (Object::Record(record), Slot::Key(key)) => {
                record.insert(key, value);
            }
            (Object::Map(map), Slot::Entry(key)) => {
                map.insert(key, value);
            }
            (Object::Set(set), Slot::Member) => {
                if !set.insert(value) {
                    return Err(JossError::malformed("duplicate set member"));
                }
            }
            (container, slot) => {
                return Err(JossError::malformed(format!(
                    "cannot store {slot:?} in {}",
                    container.kind_name()
                )));
            }
        }
        Ok(())
    }
}

/// How a frame's children are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    Root,
    Dense,
    Holes,
    Pairs,
    Record,
    Map,
    Set,
}

/// One container being filled. `container` is `None` for the root wrapper.
#[derive(Debug)]
pub(crate) struct Frame {
    container: Option<ObjectId>,
    layout: Layout,
    remaining: u64,
    /// Next slot of a dense or hole-marker array.
    next: u32,
    /// Key already read for the next child.
    pending: Option<Slot>,
}

impl Frame {
    pub fn root() -> Self {
        Self {
            container: None,
            layout: Layout::Root,
            remaining: 1,
            next: 0,
            pending: None,
        }
    }

    pub fn open(id: ObjectId, header: Header) -> Self {
        let layout = match header {
            Header::Array { .. } => Layout::Dense,
            Header::Holes { .. } => Layout::Holes,
            Header::Pairs { .. } => Layout::Pairs,
            Header::Record { .. } => Layout::Record,
            Header::Map { .. } => Layout::Map,
            Header::Set { .. } => Layout::Set,
        };
        Self {
            container: Some(id),
            layout,
            remaining: header.count(),
            next: 0,
            pending: None,
        }
    }

    fn is_keyed(&self) -> bool {
        matches!(self.layout, Layout::Pairs | Layout::Record | Layout::Map)
    }

    /// Claims the slot for the next child.
    fn take_slot(&mut self) -> Slot {
        self.remaining -= 1;
        match self.layout {
            Layout::Dense | Layout::Holes => {
                let index = self.next;
                self.next += 1;
                Slot::Index(index)
            }
            Layout::Pairs | Layout::Record | Layout::Map => {
                self.pending.take().unwrap_or(Slot::Member)
            }
            Layout::Root | Layout::Set => Slot::Member,
        }
    }
}

/// Performs one atomic decode step for the innermost frame.
pub(crate) fn step(
    reader: &mut Reader<'_>,
    frames: &mut Vec<Frame>,
    root: &mut Option<Value>,
) -> Result<()> {
    let Some(frame) = frames.last_mut() else {
        return Ok(());
    };
    if frame.remaining == 0 {
        frames.pop();
        return Ok(());
    }

    if let Some(id) = frame.container.filter(|_| frame.is_keyed() && frame.pending.is_none()) {
        match frame.layout {
            Layout::Pairs => frame.pending = Some(Slot::Index(reader.read_index(id)?)),
            Layout::Record => frame.pending = Some(Slot::Key(reader.read_property_key(id)?)),
            _ => match reader.decode_data()? {
                Item::Value(key) => {
                    reader.check_map_key(id, &key)?;
                    frame.pending = Some(Slot::Entry(key));
                }
                Item::Hole => return Err(JossError::malformed("hole as a map key")),
                Item::Collection => {
                    let (child, header) = reader.decode_header()?;
                    frame.pending = Some(Slot::Entry(Value::Object(child)));
                    frames.push(Frame::open(child, header));
                }
            },
        }
        return Ok(());
    }

    match reader.decode_data()? {
        Item::Value(value) => place(reader, frame, root, value),
        Item::Hole if frame.layout == Layout::Holes => {
            frame.take_slot();
            Ok(())
        }
        Item::Hole => Err(JossError::malformed("hole outside a sparse array")),
        Item::Collection => {
            let (child, header) = reader.decode_header()?;
            place(reader, frame, root, Value::Object(child))?;
            frames.push(Frame::open(child, header));
            Ok(())
        }
    }
}

fn place(
    reader: &mut Reader<'_>,
    frame: &mut Frame,
    root: &mut Option<Value>,
    value: Value,
) -> Result<()> {
    let slot = frame.take_slot();
    match frame.container {
        Some(parent) => reader.attach(parent, slot, value),
        None => {
            *root = Some(value);
            Ok(())
        }
    }
}

/// Decodes a complete encoding in one pass.
///
/// Nesting is tracked with the same frame stack the streaming decoder uses,
/// so depth is bounded by memory rather than the call stack.
pub fn decode_document(bytes: &[u8]) -> Result<Document> {
    let mut heap = Heap::new();
    let mut refs = DecodeRefs::new();
    let mut reader = Reader::new(bytes, 0, &mut heap, &mut refs);
    let mut frames = vec![Frame::root()];
    let mut root = None;
    while !frames.is_empty() {
        step(&mut reader, &mut frames, &mut root)?;
    }
    if reader.cursor() != bytes.len() {
        return Err(JossError::Unused);
    }
    let root = root.ok_or(JossError::Ended)?;
    Ok(Document::new(heap, root))
}
