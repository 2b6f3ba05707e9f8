//! Value encoding: `Value` graph → bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::marker::{self, tag};
use super::refs::EncodeRefs;
use super::swap::swapped;
use super::varint::{encode_biguint, uint_width};
use crate::options::Endian;
use crate::types::{Array, BigInt, Buffer, Heap, Object, ObjectId, TypedArray, Value};

/// Signal raised when the next value is a collection seen for the first time.
///
/// Its reference-table entry is already recorded at the current offset; the
/// caller opens a frame for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Nested(pub ObjectId);

/// How an array's elements are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLayout {
    /// Every slot present, elements in order.
    Dense,
    /// The first `slots` slots, holes written as hole markers.
    Holes { slots: u32 },
    /// `count` explicit index/value pairs.
    Pairs { count: u32 },
}

/// Picks the cheaper sparse representation by comparing missing slots with
/// the bytes explicit indices would take.
pub fn analyze_array(array: &Array) -> ArrayLayout {
    if array.is_dense() {
        return ArrayLayout::Dense;
    }
    let present = array.present_count() as u64;
    let index_bytes: u64 = array.iter().map(|(i, _)| index_cost(i)).sum();
    let slots = array.slot_span();
    if u64::from(slots) - present <= index_bytes {
        ArrayLayout::Holes { slots }
    } else {
        ArrayLayout::Pairs {
            count: present as u32,
        }
    }
}

fn index_cost(index: u32) -> u64 {
    match index {
        0..=255 => 2,
        256..=65_535 => 3,
        65_536..=1_677_215 => 4,
        _ => 5,
    }
}

/// The view's backing buffer, if the view is well formed.
fn backing<'h>(heap: &'h Heap, view: &TypedArray) -> Option<&'h Buffer> {
    heap.get(view.buffer())
        .and_then(Object::as_buffer)
        .filter(|b| view.fits(b.len()))
}

/// Writes values into a growing buffer, tracking object identity.
pub(crate) struct ValueWriter<'h> {
    heap: &'h Heap,
    endian: Endian,
    native: Endian,
    refs: EncodeRefs,
    buf: BytesMut,
    flushed: u64,
}

impl<'h> ValueWriter<'h> {
    pub fn new(heap: &'h Heap, endian: Endian) -> Self {
        Self::with_native(heap, endian, Endian::native())
    }

    pub fn with_native(heap: &'h Heap, endian: Endian, native: Endian) -> Self {
        Self {
            heap,
            endian,
            native,
            refs: EncodeRefs::new(),
            buf: BytesMut::new(),
            flushed: 0,
        }
    }

    pub fn heap(&self) -> &'h Heap {
        self.heap
    }

    /// Logical stream offset of the next byte.
    pub fn position(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    /// Bytes written since the last `take`.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Hands out everything written so far.
    pub fn take(&mut self) -> Bytes {
        let out = self.buf.split().freeze();
        self.flushed += out.len() as u64;
        out
    }

    /// Encodes a value unless it is an unvisited collection, in which case
    /// its offset is recorded and `Nested` is returned without writing.
    pub fn encode_leaf(&mut self, value: &Value) -> Result<(), Nested> {
        match value {
            Value::Null => self.buf.put_u8(marker::NULL),
            Value::Undefined => self.buf.put_u8(marker::UNDEFINED),
            Value::Boolean(true) => self.buf.put_u8(marker::TRUE),
            Value::Boolean(false) => self.buf.put_u8(marker::FALSE),
            Value::Number(n) => self.encode_number(*n, false),
            Value::BigInt(b) => self.encode_bigint(b, false),
            Value::String(s) => self.encode_blob(s.as_bytes(), marker::TEXT),
            Value::Object(id) => return self.encode_object(*id),
        }
        Ok(())
    }

    fn encode_object(&mut self, id: ObjectId) -> Result<(), Nested> {
        let heap = self.heap;
        let object = match heap.get(id) {
            Some(Object::Unsupported) | None => {
                self.buf.put_u8(marker::UNSUPPORTED);
                return Ok(());
            }
            Some(object) => object,
        };
        let view = match object {
            Object::TypedArray(view) => match backing(heap, view) {
                Some(buffer) => Some((view, buffer)),
                None => {
                    self.buf.put_u8(marker::UNSUPPORTED);
                    return Ok(());
                }
            },
            _ => None,
        };

        if let Some(earlier) = self.refs.visit(id, self.position()) {
            self.encode_reference(earlier);
            return Ok(());
        }

        match object {
            Object::Boolean(true) => self.buf.put_u8(marker::BOXED_TRUE),
            Object::Boolean(false) => self.buf.put_u8(marker::BOXED_FALSE),
            Object::Number(n) => self.encode_number(*n, true),
            Object::BigInt(b) => self.encode_bigint(b, true),
            Object::String(s) => self.encode_blob(s.as_bytes(), marker::BOXED_TEXT),
            Object::Buffer(b) => self.encode_blob(b.data(), buffer_subtype(b)),
            Object::Date(time) => {
                self.buf.put_u8(marker::DATE);
                let time = if time.is_finite() { *time } else { f64::NAN };
                self.encode_number(time, false);
            }
            Object::RegExp(re) => {
                self.buf.put_u8(marker::REGEXP);
                self.encode_blob(re.to_literal().as_bytes(), marker::TEXT);
            }
            Object::TypedArray(_) => {
                if let Some((view, buffer)) = view {
                    self.encode_typed_array(view, buffer);
                }
            }
            Object::Array(_) | Object::Record(_) | Object::Map(_) | Object::Set(_) => {
                return Err(Nested(id));
            }
            Object::Unsupported => self.buf.put_u8(marker::UNSUPPORTED),
        }
        Ok(())
    }

    /// Encodes a number: safe integers as sign and magnitude, everything else
    /// as little-endian IEEE-754 bits.
    fn encode_number(&mut self, value: f64, boxed: bool) {
        if value.is_nan() {
            self.buf
                .put_u8(if boxed { marker::BOXED_NAN } else { marker::NAN });
            return;
        }
        if value.is_infinite() {
            let literal = match (value > 0.0, boxed) {
                (true, false) => marker::INFINITY,
                (true, true) => marker::BOXED_INFINITY,
                (false, false) => marker::NEG_INFINITY,
                (false, true) => marker::BOXED_NEG_INFINITY,
            };
            self.buf.put_u8(literal);
            return;
        }

        let mut byte = tag(marker::NUMBER, if boxed { marker::BOXED } else { 0 });
        if value.fract() == 0.0 && value.abs() <= marker::MAX_SAFE_INTEGER {
            if value.is_sign_negative() {
                byte |= marker::NEGATIVE;
            }
            let magnitude = value.abs() as u64;
            let width = uint_width(magnitude);
            self.buf.put_u8(byte | marker::size_class(width));
            self.buf.put_uint_le(magnitude, width);
        } else {
            self.buf
                .put_u8(byte | marker::size_class(marker::FLOAT_WIDTH));
            self.buf.put_f64_le(value);
        }
    }

    fn encode_bigint(&mut self, value: &BigInt, boxed: bool) {
        let mut byte = tag(marker::BIGINT, if boxed { marker::BOXED } else { 0 });
        if value.is_negative() {
            byte |= marker::NEGATIVE;
        }
        let data = encode_biguint(value.magnitude());
        let width = uint_width(data.len() as u64);
        self.buf.put_u8(byte | marker::size_class(width));
        self.buf.put_uint_le(data.len() as u64, width);
        self.buf.put_slice(&data);
    }

    /// Length-prefixed bytes under a string-category tag.
    fn encode_blob(&mut self, data: &[u8], subtype: u8) {
        let width = uint_width(data.len() as u64);
        self.buf.put_u8(tag(
            marker::STRING,
            subtype << 3 | marker::size_class(width),
        ));
        self.buf.put_uint_le(data.len() as u64, width);
        self.buf.put_slice(data);
    }

    fn encode_typed_array(&mut self, view: &TypedArray, buffer: &Buffer) {
        let kind = view.kind();
        let mut byte = tag(marker::TYPED, kind.code());
        if self.endian.is_big() {
            byte |= marker::BIG_ENDIAN;
        }
        self.buf.put_u8(byte);

        let subtype = buffer_subtype(buffer);
        let bytes = &buffer.data()[view.byte_range()];
        if self.endian != self.native && kind.width() > 1 {
            // A swapped scratch copy has no identity of its own.
            self.encode_blob(&swapped(bytes, kind.width()), subtype);
        } else if let Some(earlier) = self.refs.visit(view.buffer(), self.position()) {
            self.encode_reference(earlier);
        } else {
            self.encode_blob(bytes, subtype);
        }
    }

    fn encode_reference(&mut self, offset: u64) {
        self.buf.put_u8(marker::REFERENCE);
        self.encode_number(offset as f64, false);
    }

    pub fn put_array_header(&mut self, array: &Array, layout: ArrayLayout) {
        let len = u64::from(array.len());
        match layout {
            ArrayLayout::Dense => {
                let width = uint_width(len);
                self.buf.put_u8(tag(
                    marker::COLLECTION,
                    marker::ARRAY << 3 | marker::size_class(width),
                ));
                self.buf.put_uint_le(len, width);
            }
            ArrayLayout::Holes { slots } => self.put_sparse_header(0, len, slots),
            ArrayLayout::Pairs { count } => self.put_sparse_header(marker::INDEXED, len, count),
        }
    }

    fn put_sparse_header(&mut self, mode: u8, len: u64, count: u32) {
        let count = u64::from(count);
        let (len_width, count_width) = (uint_width(len), uint_width(count));
        self.buf.put_u8(tag(
            marker::SPARSE,
            mode | marker::size_class(len_width) << 2 | marker::size_class(count_width),
        ));
        self.buf.put_uint_le(len, len_width);
        self.buf.put_uint_le(count, count_width);
    }

    /// Header of a record, map or set holding `len` entries.
    pub fn put_keyed_header(&mut self, subtype: u8, len: usize) {
        let len = len as u64;
        let width = uint_width(len);
        self.buf.put_u8(tag(
            marker::COLLECTION,
            subtype << 3 | marker::size_class(width),
        ));
        self.buf.put_uint_le(len, width);
    }

    pub fn put_hole(&mut self) {
        self.buf.put_u8(marker::HOLE);
    }

    pub fn put_index(&mut self, index: u32) {
        self.encode_number(f64::from(index), false);
    }

    pub fn put_key(&mut self, key: &str) {
        self.encode_blob(key.as_bytes(), marker::TEXT);
    }
}

fn buffer_subtype(buffer: &Buffer) -> u8 {
    if buffer.is_shared() {
        marker::SHARED_BUFFER
    } else {
        marker::BUFFER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Key,
    Value,
}

/// One container being written. `container` is `None` for the root wrapper.
#[derive(Debug)]
struct Frame {
    container: Option<ObjectId>,
    layout: Option<ArrayLayout>,
    stage: Stage,
    next: usize,
}

impl Frame {
    fn root() -> Self {
        Self {
            container: None,
            layout: None,
            stage: Stage::Key,
            next: 0,
        }
    }

    fn open(heap: &Heap, id: ObjectId) -> Self {
        Self {
            container: Some(id),
            layout: heap.get(id).and_then(Object::as_array).map(analyze_array),
            stage: Stage::Header,
            next: 0,
        }
    }
}

/// The next child of a container, borrowed from the heap.
enum Entry<'h> {
    Element(Option<&'h Value>),
    Indexed(u32, &'h Value),
    Property(&'h str, &'h Value),
    Keyed(&'h Value, &'h Value),
    Member(&'h Value),
}

fn entry<'h>(object: &'h Object, frame: &Frame) -> Option<Entry<'h>> {
    match object {
        Object::Array(array) => {
            let bound = match frame.layout? {
                ArrayLayout::Dense => array.len(),
                ArrayLayout::Holes { slots } => slots,
                ArrayLayout::Pairs { .. } => {
                    let from = u32::try_from(frame.next).ok()?;
                    return array.next_from(from).map(|(i, v)| Entry::Indexed(i, v));
                }
            };
            let index = u32::try_from(frame.next).ok().filter(|&i| i < bound)?;
            Some(Entry::Element(array.get(index)))
        }
        Object::Record(record) => record
            .entries()
            .get(frame.next)
            .map(|(k, v)| Entry::Property(k, v)),
        Object::Map(map) => map.entries().get(frame.next).map(|(k, v)| Entry::Keyed(k, v)),
        Object::Set(set) => set.values().get(frame.next).map(Entry::Member),
        _ => None,
    }
}

/// Depth-first walk over a value graph with an explicit stack of frames.
///
/// Each [`step`](Self::step) writes one header, key or value, so depth is
/// bounded by memory rather than the call stack. The static encoder runs it
/// to the end; the streaming encoder pauses between steps.
pub(crate) struct Walk<'h> {
    writer: ValueWriter<'h>,
    root: Value,
    frames: Vec<Frame>,
}

impl<'h> Walk<'h> {
    pub fn new(heap: &'h Heap, root: Value, endian: Endian) -> Self {
        Self {
            writer: ValueWriter::new(heap, endian),
            root,
            frames: vec![Frame::root()],
        }
    }

    pub fn writer(&self) -> &ValueWriter<'h> {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ValueWriter<'h> {
        &mut self.writer
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_done(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn step(&mut self) {
        let heap = self.writer.heap();
        let Some(frame) = self.frames.last_mut() else {
            return;
        };

        let Some(id) = frame.container else {
            if frame.next > 0 {
                self.frames.pop();
            } else {
                frame.next = 1;
                if let Err(Nested(id)) = self.writer.encode_leaf(&self.root) {
                    self.frames.push(Frame::open(heap, id));
                }
            }
            return;
        };
        let Some(object) = heap.get(id) else {
            self.frames.pop();
            return;
        };

        let nested = match frame.stage {
            Stage::Header => {
                frame.stage = Stage::Key;
                match object {
                    Object::Array(array) => {
                        let layout = frame.layout.unwrap_or(ArrayLayout::Dense);
                        self.writer.put_array_header(array, layout);
                    }
                    Object::Record(record) => {
                        self.writer.put_keyed_header(marker::RECORD, record.len())
                    }
                    Object::Map(map) => self.writer.put_keyed_header(marker::MAP, map.len()),
                    Object::Set(set) => self.writer.put_keyed_header(marker::SET, set.len()),
                    _ => {}
                }
                None
            }
            Stage::Key => match entry(object, frame) {
                None => {
                    self.frames.pop();
                    None
                }
                Some(entry) => {
                    frame.stage = Stage::Value;
                    match entry {
                        Entry::Indexed(index, _) => {
                            self.writer.put_index(index);
                            None
                        }
                        Entry::Property(key, _) => {
                            self.writer.put_key(key);
                            None
                        }
                        Entry::Keyed(key, _) => self.writer.encode_leaf(key).err(),
                        Entry::Element(_) | Entry::Member(_) => None,
                    }
                }
            },
            Stage::Value => {
                frame.stage = Stage::Key;
                match entry(object, frame) {
                    None => None,
                    Some(entry) => {
                        let value = match entry {
                            Entry::Indexed(index, value) => {
                                frame.next = index as usize + 1;
                                Some(value)
                            }
                            Entry::Element(value) => {
                                frame.next += 1;
                                value
                            }
                            Entry::Property(_, value)
                            | Entry::Keyed(_, value)
                            | Entry::Member(value) => {
                                frame.next += 1;
                                Some(value)
                            }
                        };
                        match value {
                            Some(value) => self.writer.encode_leaf(value).err(),
                            None => {
                                self.writer.put_hole();
                                None
                            }
                        }
                    }
                }
            }
        };

        if let Some(Nested(child)) = nested {
            self.frames.push(Frame::open(heap, child));
        }
    }
}

/// Encodes a complete value graph in one pass.
pub fn encode_document(heap: &Heap, root: &Value, endian: Endian) -> Bytes {
    let mut walk = Walk::new(heap, root.clone(), endian);
    while !walk.is_done() {
        walk.step();
    }
    walk.writer_mut().take()
}
