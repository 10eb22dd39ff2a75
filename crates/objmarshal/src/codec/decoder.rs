//! Graph decoder.
//!
//! Records are read into a caller-visible [`Graph`]. On failure the graph is
//! rolled back to its state before the call, so no partial object survives.

use tracing::debug;

use crate::codec::primitives::{ByteSource, Reader, SliceSource};
use crate::codec::refs::ReadRefs;
use crate::codec::tag::{FLAG_REF, Tag};
use crate::error::DecodeError;
use crate::limits::MAX_DEPTH;
use crate::model::{Graph, ObjectId, Value};

/// A decoded graph and its root.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub graph: Graph,
    pub root: ObjectId,
}

/// State for one decode call.
pub(crate) struct Decoder<'s, 'g> {
    pub(crate) input: Reader<'s>,
    pub(crate) graph: &'g mut Graph,
    pub(crate) refs: ReadRefs,
    pub(crate) allow_code: bool,
}

impl<'s, 'g> Decoder<'s, 'g> {
    pub(crate) fn new(
        source: &'s mut dyn ByteSource,
        graph: &'g mut Graph,
        allow_code: bool,
    ) -> Self {
        Self {
            input: Reader::new(source),
            graph,
            refs: ReadRefs::new(),
            allow_code,
        }
    }

    /// Reads one object at nesting level `depth`.
    pub(crate) fn read_object(&mut self, depth: usize) -> Result<ObjectId, DecodeError> {
        self.read_entry(depth)?.ok_or(DecodeError::UnexpectedStopMark)
    }

    /// Reads one object, or `None` for the stop mark that ends a mapping.
    ///
    /// The depth guard runs before the tag byte is consumed.
    pub(crate) fn read_entry(&mut self, depth: usize) -> Result<Option<ObjectId>, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::RecursionTooDeep { depth });
        }
        let byte = self.input.read_byte("tag")?;
        let tag = Tag::from_u8(byte).ok_or(DecodeError::UnknownTag { tag: byte })?;
        let flag = byte & FLAG_REF != 0;

        // Each arm yields the result directly so the recursive frame stays small.
        let result = match tag {
            Tag::StopMark => return Ok(None),
            Tag::Unit => Ok(self.graph.none()),
            Tag::False => Ok(self.graph.bool(false)),
            Tag::True => Ok(self.graph.bool(true)),
            Tag::Ellipsis => Ok(self.graph.ellipsis()),
            Tag::SmallInt => self.read_small_int(flag),
            Tag::Int64 => self.read_int64(flag),
            Tag::BigInt => self.read_bigint(flag),
            Tag::FloatBinary => self.read_float(true, flag),
            Tag::FloatText => self.read_float(false, flag),
            Tag::ComplexBinary => self.read_complex(true, flag),
            Tag::ComplexText => self.read_complex(false, flag),
            Tag::Bytes => self.read_bytes(flag),
            Tag::TextUtf8
            | Tag::TextInterned
            | Tag::TextAscii
            | Tag::TextAsciiInterned
            | Tag::TextAsciiShort
            | Tag::TextAsciiShortInterned => self.read_text(tag, flag),
            Tag::Tuple => self.read_tuple(false, flag, depth),
            Tag::TupleSmall => self.read_tuple(true, flag, depth),
            Tag::Sequence => self.read_sequence(flag, depth),
            Tag::Mapping => self.read_mapping(flag, depth),
            Tag::MutableSet => self.read_mutable_set(flag, depth),
            Tag::ImmutableSet => self.read_immutable_set(flag, depth),
            Tag::Slice => self.read_slice(flag, depth),
            Tag::ProcedureRecord => self.read_procedure(flag, depth),
            Tag::BackReference => self.read_back_reference(),
        };
        result.map(Some)
    }

    fn read_back_reference(&mut self) -> Result<ObjectId, DecodeError> {
        let index = self.input.read_i32("back-reference")?;
        self.refs.resolve(self.graph, index)
    }

    /// Allocates a value and registers it when flagged.
    ///
    /// Containers come through here as empty shells, so their children can
    /// refer back to them.
    pub(crate) fn finish(&mut self, value: Value, flag: bool) -> Result<ObjectId, DecodeError> {
        let id = self.graph.alloc(value);
        if flag {
            self.refs.register(id)?;
        }
        Ok(id)
    }

    /// Reserves a pending slot for a flagged record built atomically.
    pub(crate) fn reserve_if(&mut self, flag: bool) -> Result<Option<usize>, DecodeError> {
        if !flag {
            return Ok(None);
        }
        let (index, _) = self.refs.reserve(self.graph)?;
        Ok(Some(index))
    }

    /// Stores an atomically built value, backfilling its slot if reserved.
    pub(crate) fn complete(
        &mut self,
        slot: Option<usize>,
        value: Value,
    ) -> Result<ObjectId, DecodeError> {
        match slot {
            Some(index) => self.refs.fill(self.graph, index, value),
            None => Ok(self.graph.alloc(value)),
        }
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Decodes one object graph from `source` into a new graph.
pub fn decode(source: &mut dyn ByteSource, allow_code: bool) -> Result<Decoded, DecodeError> {
    let mut graph = Graph::new();
    let root = decode_into(source, allow_code, &mut graph)?;
    Ok(Decoded { graph, root })
}

/// Decodes one object graph from `source` into an existing graph.
///
/// Interned texts resolve against the graph's interning table, so several
/// streams decoded into one graph share their interned objects. On failure
/// the graph is restored to its state before the call.
pub fn decode_into(
    source: &mut dyn ByteSource,
    allow_code: bool,
    graph: &mut Graph,
) -> Result<ObjectId, DecodeError> {
    let mark = graph.mark();
    let before = graph.len();
    let (result, consumed) = {
        let mut decoder = Decoder::new(source, graph, allow_code);
        let result = decoder.read_object(1);
        (result, decoder.input.consumed())
    };

    match result {
        Ok(root) => {
            debug!(
                bytes = consumed,
                nodes = graph.len() - before,
                "decoded object graph"
            );
            Ok(root)
        }
        Err(error) => {
            graph.rollback(mark);
            debug!(bytes = consumed, %error, "decode failed");
            Err(error)
        }
    }
}

/// Decodes one object graph from a byte slice.
///
/// Bytes after the root record are ignored.
pub fn decode_from_slice(input: &[u8], allow_code: bool) -> Result<Decoded, DecodeError> {
    decode(&mut SliceSource::new(input), allow_code)
}

/// Decodes one object graph and returns the number of bytes it used.
///
/// Useful for reading several records stored back to back.
pub fn decode_from_slice_partial(
    input: &[u8],
    allow_code: bool,
) -> Result<(Decoded, usize), DecodeError> {
    let mut source = SliceSource::new(input);
    let decoded = decode(&mut source, allow_code)?;
    Ok((decoded, source.position()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_singletons_reuse_nodes() {
        let decoded = decode_from_slice(&[19, 3, 0, 1, 4], false).unwrap();
        let graph = &decoded.graph;
        assert_eq!(
            graph.get(decoded.root),
            Some(&Value::Tuple(vec![graph.none(), graph.bool(false), graph.ellipsis()]))
        );
    }

    #[test]
    fn test_unknown_tag() {
        let err = decode_from_slice(&[0x7F], false).unwrap_err();
        assert_eq!(err, DecodeError::UnknownTag { tag: 0x7F });
        assert_eq!(err.code(), ErrorCode::Malformed);
    }

    #[test]
    fn test_empty_input() {
        let err = decode_from_slice(&[], false).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEof { context: "tag" });
        assert_eq!(err.code(), ErrorCode::Truncated);
    }

    #[test]
    fn test_depth_guard_precedes_tag_read() {
        // Every level opens a one-element sequence; the innermost element is
        // missing, so only the depth guard can stop the read before the end.
        let bytes = [20u8, 1, 0, 0, 0].repeat(MAX_DEPTH);
        assert_eq!(
            decode_from_slice(&bytes, false).unwrap_err(),
            DecodeError::RecursionTooDeep { depth: MAX_DEPTH + 1 }
        );

        let mut source = SliceSource::new(&[]);
        let mut graph = Graph::new();
        let mut decoder = Decoder::new(&mut source, &mut graph, false);
        assert_eq!(
            decoder.read_entry(MAX_DEPTH + 1).unwrap_err(),
            DecodeError::RecursionTooDeep { depth: MAX_DEPTH + 1 }
        );
        assert_eq!(decoder.input.consumed(), 0);
    }

    #[test]
    fn test_back_reference_out_of_range() {
        let bytes = [20, 1, 0, 0, 0, 25, 3, 0, 0, 0];
        assert_eq!(
            decode_from_slice(&bytes, false).unwrap_err(),
            DecodeError::BadReference { index: 3, size: 0 }
        );
    }

    #[test]
    fn test_int64_legacy_tag() {
        let mut bytes = vec![27];
        bytes.extend_from_slice(&(-5_000_000_000i64).to_le_bytes());
        let decoded = decode_from_slice(&bytes, false).unwrap();
        assert_eq!(decoded.graph.get(decoded.root), Some(&Value::Int(-5_000_000_000)));
    }

    #[test]
    fn test_rollback_on_failure() {
        let mut graph = Graph::new();
        let existing = graph.intern("kept");
        let len = graph.len();

        // Sequence of an interned text followed by truncated input.
        let bytes = [20, 2, 0, 0, 0, 17, 3, b'n', b'e', b'w'];
        let mut source = SliceSource::new(&bytes);
        assert!(decode_into(&mut source, false, &mut graph).is_err());

        assert_eq!(graph.len(), len);
        assert_eq!(graph.interning().get("new"), None);
        assert_eq!(graph.interning().get("kept"), Some(existing));
    }

    #[test]
    fn test_decode_into_shares_interning() {
        let mut graph = Graph::new();
        let first = decode_into(&mut SliceSource::new(&[17, 1, b'k']), false, &mut graph).unwrap();
        let mut source = SliceSource::new(&[13, 1, 0, 0, 0, b'k']);
        let second = decode_into(&mut source, false, &mut graph).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_reports_consumed() {
        let bytes = [5, 1, 0, 0, 0, 5, 2, 0, 0, 0];
        let (first, used) = decode_from_slice_partial(&bytes, false).unwrap();
        assert_eq!(used, 5);
        assert_eq!(first.graph.get(first.root), Some(&Value::Int(1)));

        let (second, used) = decode_from_slice_partial(&bytes[used..], false).unwrap();
        assert_eq!(used, 5);
        assert_eq!(second.graph.get(second.root), Some(&Value::Int(2)));
    }
}
