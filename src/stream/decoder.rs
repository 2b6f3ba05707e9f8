//! Incremental decoder fed with arbitrary byte chunks.
//!
//! Nesting is tracked with an explicit stack of frames, one per open
//! container. A container is attached to its parent as soon as its header is
//! read, so finishing a frame is just popping it. When the buffered bytes end
//! inside a value, the round stops and the value is retried on the next
//! `write`.

use bytes::{Buf, BytesMut};

use crate::error::JossError;
use crate::options::DeserializeOptions;
use crate::types::{Document, Heap, Value};
use crate::wire::decode::{Frame, Reader, step};
use crate::wire::refs::DecodeRefs;

/// Push-based decoder session.
///
/// Feed chunks with [`write`](Self::write) and finish with
/// [`close`](Self::close). Any error other than running out of bytes fails
/// the session; later calls then return [`JossError::Failed`].
pub struct StreamDecoder {
    buffer: BytesMut,
    offset: u64,
    received: usize,
    max_length: usize,
    heap: Heap,
    refs: DecodeRefs,
    frames: Vec<Frame>,
    root: Option<Value>,
    failed: bool,
}

impl StreamDecoder {
    pub fn new(options: &DeserializeOptions) -> Self {
        Self {
            buffer: BytesMut::new(),
            offset: 0,
            received: 0,
            max_length: options.get_max_length(),
            heap: Heap::new(),
            refs: DecodeRefs::new(),
            frames: vec![Frame::root()],
            root: None,
            failed: false,
        }
    }

    /// Total bytes accepted so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Whether the root value has been fully decoded.
    pub fn is_complete(&self) -> bool {
        self.frames.is_empty()
    }

    /// Consumes a chunk, decoding as far as the buffered bytes allow.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), JossError> {
        if self.failed {
            return Err(JossError::Failed);
        }
        self.received = self.received.saturating_add(chunk.len());
        if self.received > self.max_length {
            return Err(self.fail(JossError::Exceeded {
                limit: self.max_length,
            }));
        }
        self.buffer.extend_from_slice(chunk);
        if self.frames.is_empty() {
            return Ok(());
        }
        match self.drain() {
            Ok(()) => {
                tracing::trace!(
                    bytes = chunk.len(),
                    offset = self.offset,
                    buffered = self.buffer.len(),
                    depth = self.frames.len(),
                    "decoded chunk"
                );
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Finishes the session and returns the decoded document.
    pub fn close(self) -> Result<Document, JossError> {
        if self.failed {
            return Err(JossError::Failed);
        }
        match self.root {
            Some(root) if self.frames.is_empty() && self.buffer.is_empty() => {
                tracing::debug!(bytes = self.received, objects = self.heap.len(), "decode complete");
                Ok(Document::new(self.heap, root))
            }
            _ => {
                tracing::debug!(
                    buffered = self.buffer.len(),
                    complete = self.frames.is_empty(),
                    "closed with unused input"
                );
                Err(JossError::Unused)
            }
        }
    }

    fn fail(&mut self, error: JossError) -> JossError {
        self.failed = true;
        tracing::debug!(code = error.code(), offset = self.offset, error = %error, "decode failed");
        error
    }

    /// Runs decode steps until the input ends or the root is complete, then
    /// drops the consumed bytes.
    fn drain(&mut self) -> Result<(), JossError> {
        let mut reader = Reader::new(&self.buffer, self.offset, &mut self.heap, &mut self.refs);
        let result = loop {
            if self.frames.is_empty() {
                break Ok(());
            }
            match step(&mut reader, &mut self.frames, &mut self.root) {
                Ok(()) => {}
                Err(JossError::Ended) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let consumed = reader.cursor();
        self.offset = reader.offset();
        self.buffer.advance(consumed);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Endian, SerializeOptions};
    use crate::stream::encoder::StreamEncoder;
    use crate::types::{Array, Buffer, Map, Object, Record, RegExp, TypedArray, TypedArrayKind};
    use crate::wire::decode::decode_document;
    use crate::wire::encode::encode_document;

    fn sample() -> Document {
        let mut heap = Heap::new();
        let mut sparse = Array::with_len(300);
        sparse.set(7, Value::from(-7));
        sparse.set(250, Value::from("far"));
        let sparse = heap.insert(Object::Array(sparse));
        let mut holes = Array::with_len(4);
        holes.set(2, Value::Undefined);
        let holes = heap.insert(Object::Array(holes));

        let list = heap.insert(Object::Array(Array::from(vec![Value::from(1), Value::from(2)])));
        let mut map = Map::new();
        map.insert(list.clone(), Value::from("list key"));
        map.insert(Value::Number(f64::NAN), list);
        let map = heap.insert(Object::Map(map));
        let re = heap.insert(Object::RegExp(RegExp::new("^x$", "m")));
        let date = heap.insert(Object::Date(86_400_000.0));

        let mut record = Record::new();
        record.insert("sparse", sparse);
        record.insert("holes", holes);
        record.insert("map", map);
        record.insert("re", re);
        record.insert("date", date.clone());
        record.insert("date again", date);
        record.insert("text", Value::from("unicode \u{1F600}"));
        let root = heap.alloc(Object::Record(record));
        if let Some(record) = heap[root].as_record_mut() {
            record.insert("self", Value::Object(root));
        }
        Document::new(heap, Value::Object(root))
    }

    fn feed(bytes: &[u8], split: usize) -> Result<Document, JossError> {
        let mut decoder = StreamDecoder::new(&DeserializeOptions::new());
        for chunk in bytes.chunks(split) {
            decoder.write(chunk)?;
        }
        decoder.close()
    }

    #[test]
    fn any_split_matches_static_decode() {
        let doc = sample();
        let bytes = encode_document(&doc.heap, &doc.root, Endian::native());
        let expected = decode_document(&bytes).unwrap();
        assert!(expected.equivalent(&doc));

        for split in [1, 2, 3, 5, 8, 64, bytes.len()] {
            let decoded = feed(&bytes, split).unwrap();
            assert!(decoded.equivalent(&doc), "split {split}");
        }
    }

    #[test]
    fn decodes_stream_encoder_output() {
        let doc = sample();
        let options = SerializeOptions::new().chunk_size(7).unwrap();
        let mut decoder = StreamDecoder::new(&DeserializeOptions::new());
        for chunk in StreamEncoder::new(&doc.heap, doc.root.clone(), &options) {
            decoder.write(&chunk).unwrap();
        }
        assert!(decoder.is_complete());
        assert!(decoder.close().unwrap().equivalent(&doc));
    }

    #[test]
    fn self_reference_survives_streaming() {
        let bytes = [0x88, 0x01, 0x60, 0x04, b's', b'e', b'l', b'f', 0x1D, 0x20, 0x00];
        let doc = feed(&bytes, 1).unwrap();
        let id = doc.root.as_object().unwrap();
        assert_eq!(
            doc.heap[id].as_record().and_then(|r| r.get("self")),
            Some(&Value::Object(id))
        );
    }

    #[test]
    fn prefix_never_errors_until_close() {
        let doc = sample();
        let bytes = encode_document(&doc.heap, &doc.root, Endian::native());
        for end in 0..bytes.len() {
            let mut decoder = StreamDecoder::new(&DeserializeOptions::new());
            for byte in &bytes[..end] {
                decoder.write(std::slice::from_ref(byte)).unwrap();
            }
            assert!(!decoder.is_complete());
            assert!(matches!(decoder.close(), Err(JossError::Unused)), "prefix {end}");
        }
    }

    #[test]
    fn trailing_bytes_are_unused() {
        let mut decoder = StreamDecoder::new(&DeserializeOptions::new());
        decoder.write(&[0x02, 0x00]).unwrap();
        assert!(decoder.is_complete());
        assert!(matches!(decoder.close(), Err(JossError::Unused)));
    }

    #[test]
    fn primitive_root() {
        let doc = feed(&[0x21, 0x00, 0x01], 1).unwrap();
        assert_eq!(doc.root, Value::from(256));
    }

    #[test]
    fn exceeding_the_limit_fails_the_session() {
        let options = DeserializeOptions::new().max_length(4).unwrap();
        let mut decoder = StreamDecoder::new(&options);
        decoder.write(&[0x80, 0x03, 0x00]).unwrap();
        assert!(matches!(
            decoder.write(&[0x00, 0x00]),
            Err(JossError::Exceeded { limit: 4 })
        ));
        assert!(matches!(decoder.write(&[]), Err(JossError::Failed)));
        assert!(matches!(decoder.close(), Err(JossError::Failed)));
    }

    #[test]
    fn malformed_input_fails_the_session() {
        let mut decoder = StreamDecoder::new(&DeserializeOptions::new());
        assert!(matches!(
            decoder.write(&[0x88, 0x01, 0x60, 0x00, 0x0C]),
            Err(JossError::Malformed(_))
        ));
        assert!(matches!(decoder.write(&[0x00]), Err(JossError::Failed)));
    }

    #[test]
    fn holes_only_in_hole_marker_arrays() {
        assert!(feed(&[0xA0, 0x02, 0x02, 0x0C, 0x00], 1).is_ok());
        assert!(matches!(
            feed(&[0xB0, 0x02, 0x01, 0x20, 0x00, 0x0C], 1),
            Err(JossError::Malformed(_))
        ));
        assert!(matches!(feed(&[0x80, 0x01, 0x0C], 1), Err(JossError::Malformed(_))));
        assert!(matches!(feed(&[0x90, 0x01, 0x0C, 0x00], 1), Err(JossError::Malformed(_))));
    }

    #[test]
    fn duplicate_keys_are_malformed() {
        assert!(matches!(
            feed(&[0x88, 0x02, 0x60, 0x00, 0x00, 0x60, 0x00, 0x00], 3),
            Err(JossError::Malformed(_))
        ));
        assert!(matches!(
            feed(&[0x90, 0x02, 0x0A, 0x00, 0x0A, 0x00], 2),
            Err(JossError::Malformed(_))
        ));
        assert!(matches!(
            feed(&[0x98, 0x02, 0x60, 0x01, b'a', 0x60, 0x01, b'a'], 1),
            Err(JossError::Malformed(_))
        ));
    }

    #[test]
    fn collection_map_keys_keep_identity() {
        // Map { [] => "v" } followed by nothing else
        let bytes = [0x90, 0x01, 0x80, 0x00, 0x60, 0x01, b'v'];
        let doc = feed(&bytes, 1).unwrap();
        let map = doc.root_object().and_then(Object::as_map).unwrap();
        let (key, value) = map.iter().next().unwrap();
        let key = key.as_object().unwrap();
        assert!(doc.heap[key].as_array().is_some_and(Array::is_empty));
        assert_eq!(value, &Value::from("v"));
    }

    #[test]
    fn deep_nesting_streams_and_matches_static() {
        let mut bytes = [0x80, 0x01].repeat(100_000);
        bytes.push(0x00);
        let streamed = feed(&bytes, 4096).unwrap();
        let direct = decode_document(&bytes).unwrap();
        assert!(streamed.equivalent(&direct));
    }

    #[test]
    fn input_of_exactly_the_limit_is_accepted() {
        let bytes = [0x80, 0x02, 0x00, 0x02];
        let options = DeserializeOptions::new().max_length(bytes.len()).unwrap();

        let mut decoder = StreamDecoder::new(&options);
        decoder.write(&bytes[..2]).unwrap();
        decoder.write(&bytes[2..]).unwrap();
        assert_eq!(decoder.received(), 4);
        assert!(decoder.close().is_ok());

        let mut decoder = StreamDecoder::new(&options);
        decoder.write(&bytes).unwrap();
        assert!(matches!(
            decoder.write(&[0x00]),
            Err(JossError::Exceeded { limit: 4 })
        ));
        assert!(matches!(decoder.close(), Err(JossError::Failed)));
    }

    #[test]
    fn foreign_endian_views_stream() {
        let foreign = match Endian::native() {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        };
        let values = [1.5f64, -2.25, 1e300];
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut heap = Heap::new();
        let buffer = heap.alloc(Object::Buffer(Buffer::new(data.clone())));
        let view = heap.insert(Object::TypedArray(TypedArray::new(
            TypedArrayKind::Float64,
            buffer,
            data.len(),
        )));
        let root = heap.insert(Object::Array(Array::from(vec![view.clone(), view])));
        let bytes = encode_document(&heap, &root, foreign);

        for split in [1, 5, bytes.len()] {
            let doc = feed(&bytes, split).unwrap();
            assert!(doc.equivalent(&Document::new(heap.clone(), root.clone())), "split {split}");
            let array = doc.root_object().and_then(Object::as_array).unwrap();
            let id = array.get(0).and_then(Value::as_object).unwrap();
            assert_eq!(doc.heap.view_bytes(id), Some(&data[..]));
        }
    }
}
