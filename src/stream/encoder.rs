//! Incremental encoder producing bounded chunks.

use bytes::Bytes;

use crate::options::SerializeOptions;
use crate::types::{Heap, Value};
use crate::wire::encode::Walk;

/// Result of one call to [`StreamEncoder::next_step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeStep {
    /// A non-empty slice of the encoding.
    Chunk(Bytes),
    /// Nothing was produced but the encoding is unfinished; call again.
    Again,
    /// The encoding is complete.
    End,
}

/// Pull-based encoder that suspends between container children.
///
/// Each call to [`next_step`](Self::next_step) writes until roughly the
/// configured chunk size has been produced. Concatenating every chunk gives
/// exactly the bytes [`serialize`](crate::serialize) returns.
pub struct StreamEncoder<'h> {
    walk: Walk<'h>,
    chunk_size: usize,
}

impl<'h> StreamEncoder<'h> {
    pub fn new(heap: &'h Heap, root: Value, options: &SerializeOptions) -> Self {
        Self {
            walk: Walk::new(heap, root, options.get_endian()),
            chunk_size: options.get_chunk_size(),
        }
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> u64 {
        let writer = self.walk.writer();
        writer.position() - writer.pending() as u64
    }

    pub fn is_finished(&self) -> bool {
        self.walk.is_done() && self.walk.writer().pending() == 0
    }

    /// Performs one bounded unit of work.
    pub fn next_step(&mut self) -> EncodeStep {
        while self.walk.writer().pending() < self.chunk_size && !self.walk.is_done() {
            self.walk.step();
        }
        if self.walk.writer().pending() > 0 {
            let chunk = self.walk.writer_mut().take();
            tracing::trace!(
                bytes = chunk.len(),
                offset = self.walk.writer().position(),
                depth = self.walk.depth(),
                "encoded chunk"
            );
            EncodeStep::Chunk(chunk)
        } else if self.walk.is_done() {
            EncodeStep::End
        } else {
            EncodeStep::Again
        }
    }

    /// Exposes the chunks as an asynchronous stream.
    #[cfg(feature = "stream")]
    pub fn into_stream(self) -> impl futures_util::Stream<Item = Bytes> + 'h {
        futures_util::stream::iter(self)
    }
}

impl Iterator for StreamEncoder<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        loop {
            match self.next_step() {
                EncodeStep::Chunk(chunk) => return Some(chunk),
                EncodeStep::Again => continue,
                EncodeStep::End => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Endian;
    use crate::types::{Array, Buffer, Map, Object, Record, Set, TypedArray, TypedArrayKind};
    use crate::wire::encode::encode_document;

    fn sample(heap: &mut Heap) -> Value {
        let mut sparse = Array::with_len(5000);
        sparse.set(3, Value::from("three"));
        sparse.set(4000, Value::from(4000));
        let mut holes = Array::with_len(6);
        holes.set(1, Value::Null);
        holes.set(4, Value::Boolean(true));
        let sparse = heap.insert(Object::Array(sparse));
        let holes = heap.insert(Object::Array(holes));

        let key = heap.insert(Object::Set([Value::from(1), Value::from(2)].into_iter().collect()));
        let mut map = Map::new();
        map.insert(key.clone(), Value::from("set key"));
        map.insert(Value::from("k"), key);
        let map = heap.insert(Object::Map(map));

        let buffer = heap.alloc(Object::Buffer(Buffer::new((0u8..64).collect())));
        let view = heap.insert(Object::TypedArray(TypedArray::new(
            TypedArrayKind::Float64,
            buffer,
            64,
        )));

        let mut record = Record::new();
        record.insert("sparse", sparse);
        record.insert("holes", holes);
        record.insert("map", map);
        record.insert("view", view.clone());
        record.insert("again", view);
        record.insert("long", Value::from("x".repeat(200)));
        let root = heap.alloc(Object::Record(record));
        if let Some(record) = heap[root].as_record_mut() {
            record.insert("self", Value::Object(root));
        }
        Value::Object(root)
    }

    #[test]
    fn chunks_concatenate_to_static_encoding() {
        let mut heap = Heap::new();
        let root = sample(&mut heap);
        let expected = encode_document(&heap, &root, Endian::Big);

        for size in [1, 3, 16, 1024] {
            let options = SerializeOptions::new()
                .endian(Endian::Big)
                .chunk_size(size)
                .unwrap();
            let chunks: Vec<Bytes> = StreamEncoder::new(&heap, root.clone(), &options).collect();
            assert!(chunks.iter().all(|c| !c.is_empty()));
            assert_eq!(chunks.concat(), expected.to_vec(), "chunk size {size}");
        }
    }

    #[test]
    fn small_budget_yields_many_chunks() {
        let mut heap = Heap::new();
        let items: Array = (0..100).map(Value::from).collect();
        let root = heap.insert(Object::Array(items));
        let options = SerializeOptions::new().chunk_size(8).unwrap();
        let mut encoder = StreamEncoder::new(&heap, root, &options);

        let mut count = 0;
        loop {
            match encoder.next_step() {
                EncodeStep::Chunk(chunk) => {
                    assert!(chunk.len() < 8 + 3);
                    count += 1;
                }
                EncodeStep::Again => {}
                EncodeStep::End => break,
            }
        }
        assert!(count > 10);
        assert!(encoder.is_finished());
        assert_eq!(encoder.next_step(), EncodeStep::End);
    }

    #[test]
    fn primitive_root_is_one_chunk() {
        let heap = Heap::new();
        let mut encoder = StreamEncoder::new(&heap, Value::from(256), &SerializeOptions::new());
        assert_eq!(
            encoder.next_step(),
            EncodeStep::Chunk(Bytes::from_static(&[0x21, 0x00, 0x01]))
        );
        assert_eq!(encoder.next_step(), EncodeStep::End);
        assert_eq!(encoder.position(), 3);
    }

    #[test]
    fn nested_empty_collections() {
        let mut heap = Heap::new();
        let inner = heap.insert(Object::Set(Set::new()));
        let root = heap.insert(Object::Array(Array::from(vec![inner, Value::Null])));
        let bytes: Vec<u8> = StreamEncoder::new(&heap, root, &SerializeOptions::new())
            .flatten()
            .collect();
        assert_eq!(bytes, [0x80, 0x02, 0x98, 0x00, 0x00]);
    }

    #[test]
    fn deep_nesting_chunks_match_static() {
        let mut heap = Heap::new();
        let mut root = Value::from("leaf");
        for _ in 0..100_000 {
            root = heap.insert(Object::Array(Array::from(vec![root])));
        }
        let options = SerializeOptions::new().chunk_size(1000).unwrap();
        let chunked: Vec<u8> = StreamEncoder::new(&heap, root.clone(), &options)
            .flatten()
            .collect();
        assert_eq!(chunked.len(), 200_000 + 6);
        assert_eq!(chunked, encode_document(&heap, &root, Endian::native()).to_vec());
    }
}
