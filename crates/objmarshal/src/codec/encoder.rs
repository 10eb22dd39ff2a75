//! Graph encoder.
//!
//! Output is staged in memory and handed to the sink only when the whole
//! graph encoded, so a failed call never leaves a partial record behind.

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::codec::format::FormatDescriptor;
use crate::codec::primitives::{ByteSink, Writer};
use crate::codec::refs::{ShareCounts, WriteRefs};
use crate::codec::tag::Tag;
use crate::error::EncodeError;
use crate::limits::MAX_DEPTH;
use crate::model::{Graph, ObjectId, Value};

/// State for one encode call.
pub(crate) struct Encoder<'g> {
    pub(crate) graph: &'g Graph,
    pub(crate) format: FormatDescriptor,
    pub(crate) shares: &'g ShareCounts,
    pub(crate) refs: WriteRefs,
    pub(crate) out: Writer,
    /// Set sort keys of subtrees that contain no shared object.
    pub(crate) keys: FxHashMap<ObjectId, Vec<u8>>,
    /// Reference table lookups made by this encoder.
    pub(crate) ref_lookups: usize,
}

impl<'g> Encoder<'g> {
    pub(crate) fn new(graph: &'g Graph, format: FormatDescriptor, shares: &'g ShareCounts) -> Self {
        Self {
            graph,
            format,
            shares,
            refs: WriteRefs::new(),
            out: Writer::with_capacity(256),
            keys: FxHashMap::default(),
            ref_lookups: 0,
        }
    }

    /// Encoder that continues from this one's reference table.
    ///
    /// The key cache moves into the scratch encoder; hand it back with
    /// [`Encoder::reclaim_keys`].
    pub(crate) fn scratch(&mut self) -> Encoder<'g> {
        Encoder {
            graph: self.graph,
            format: self.format,
            shares: self.shares,
            refs: self.refs.clone(),
            out: Writer::new(),
            keys: std::mem::take(&mut self.keys),
            ref_lookups: 0,
        }
    }

    pub(crate) fn reclaim_keys(&mut self, scratch: &mut Encoder<'g>) {
        self.keys = std::mem::take(&mut scratch.keys);
    }

    /// Writes the object at `id`, which sits at nesting level `depth`.
    pub(crate) fn write_object(&mut self, id: ObjectId, depth: usize) -> Result<(), EncodeError> {
        if depth > MAX_DEPTH {
            return Err(EncodeError::NestedTooDeep { depth });
        }
        let graph = self.graph;
        let value = graph.get(id).ok_or(EncodeError::DanglingObject { id })?;

        let mut flag = false;
        if self.format.tracks_references() && self.shares.is_shared(id, value) {
            self.ref_lookups += 1;
            if let Some(index) = self.refs.register(id)? {
                self.out.write_byte(Tag::BackReference.byte(false));
                self.out.write_i32(index as i32);
                return Ok(());
            }
            flag = true;
        }
        self.write_value(value, flag, depth)
    }

    // Each arm yields the result directly so the recursive frame stays small.
    fn write_value(
        &mut self,
        value: &'g Value,
        flag: bool,
        depth: usize,
    ) -> Result<(), EncodeError> {
        match value {
            Value::Unit => self.write_tag(Tag::Unit),
            Value::Bool(false) => self.write_tag(Tag::False),
            Value::Bool(true) => self.write_tag(Tag::True),
            Value::Ellipsis => self.write_tag(Tag::Ellipsis),
            Value::Int(v) => {
                self.write_int(*v, flag);
                Ok(())
            }
            Value::BigInt(v) => self.write_bigint(v, flag),
            Value::Float(v) => self.write_float(*v, flag),
            Value::Complex { real, imag } => self.write_complex(*real, *imag, flag),
            Value::Bytes(bytes) => {
                self.out.write_byte(Tag::Bytes.byte(flag));
                self.out.write_bytes_prefixed(bytes)
            }
            Value::Text(text) => self.write_text(text, flag),
            Value::Tuple(items) => self.write_tuple(items, flag, depth),
            Value::Sequence(items) => self.write_sequence(items, flag, depth),
            Value::Mapping(entries) => self.write_mapping(entries, flag, depth),
            Value::MutableSet(items) => self.write_set(Tag::MutableSet, items, flag, depth),
            Value::ImmutableSet(items) => self.write_set(Tag::ImmutableSet, items, flag, depth),
            Value::Slice { start, stop, step } => {
                self.write_slice([*start, *stop, *step], flag, depth)
            }
            Value::ProcedureRecord(record) => self.write_procedure(record, flag, depth),
            Value::Pending | Value::Unsupported(_) => Err(EncodeError::Unmarshallable {
                kind: value.kind_name(),
            }),
        }
    }

    fn write_tag(&mut self, tag: Tag) -> Result<(), EncodeError> {
        self.out.write_byte(tag.byte(false));
        Ok(())
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Encodes the graph rooted at `root` into `sink`.
///
/// Fails with `UnsupportedVersion` for versions above
/// [`CURRENT_VERSION`](crate::limits::CURRENT_VERSION). Nothing reaches the
/// sink unless the whole graph encodes.
pub fn encode(
    graph: &Graph,
    root: ObjectId,
    version: u8,
    allow_code: bool,
    sink: &mut dyn ByteSink,
) -> Result<(), EncodeError> {
    let format = FormatDescriptor::new(version)?.with_allow_code(allow_code);
    encode_with(graph, root, format, sink)
}

/// Encodes with an explicit [`FormatDescriptor`].
pub fn encode_with(
    graph: &Graph,
    root: ObjectId,
    format: FormatDescriptor,
    sink: &mut dyn ByteSink,
) -> Result<(), EncodeError> {
    let bytes = encode_to_vec(graph, root, format)?;
    sink.write_bytes(&bytes).map_err(|e| EncodeError::Sink(e.to_string()))
}

/// Encodes the graph rooted at `root` into a new buffer.
pub fn encode_to_vec(
    graph: &Graph,
    root: ObjectId,
    format: FormatDescriptor,
) -> Result<Vec<u8>, EncodeError> {
    let shares = ShareCounts::analyze(graph, root)?;
    let mut encoder = Encoder::new(graph, format, &shares);
    match encoder.write_object(root, 1) {
        Ok(()) => {
            debug!(
                version = format.version(),
                bytes = encoder.out.len(),
                references = encoder.refs.len(),
                "encoded object graph"
            );
            Ok(encoder.out.into_bytes())
        }
        Err(error) => {
            debug!(version = format.version(), %error, "encode failed");
            Err(error)
        }
    }
}

/// SHA-256 of the encoding of `root` at `version`.
///
/// Set ordering makes the encoding a function of logical content, so equal
/// graphs built in different orders share a fingerprint. Procedure records
/// are included.
pub fn fingerprint(graph: &Graph, root: ObjectId, version: u8) -> Result<[u8; 32], EncodeError> {
    let format = FormatDescriptor::new(version)?.with_allow_code(true);
    let bytes = encode_to_vec(graph, root, format)?;
    Ok(Sha256::digest(&bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_at(graph: &Graph, root: ObjectId, version: u8) -> Vec<u8> {
        encode_to_vec(graph, root, FormatDescriptor::new(version).unwrap()).unwrap()
    }

    #[test]
    fn test_singletons() {
        let graph = Graph::new();
        assert_eq!(bytes_at(&graph, graph.none(), 5), vec![0]);
        assert_eq!(bytes_at(&graph, graph.bool(false), 5), vec![1]);
        assert_eq!(bytes_at(&graph, graph.bool(true), 5), vec![2]);
        assert_eq!(bytes_at(&graph, graph.ellipsis(), 5), vec![4]);
    }

    #[test]
    fn test_shared_object_becomes_back_reference() {
        let mut graph = Graph::new();
        let f = graph.float(0.5);
        let root = graph.list(vec![f, f]);

        let bytes = bytes_at(&graph, root, 3);
        let mut expected = vec![20, 2, 0, 0, 0, 8 | 0x80];
        expected.extend_from_slice(&0.5f64.to_le_bytes());
        expected.extend_from_slice(&[25, 0, 0, 0, 0]);
        assert_eq!(bytes, expected);

        // Below version 3 the value is repeated.
        let mut expected = vec![20, 2, 0, 0, 0];
        for _ in 0..2 {
            expected.push(8);
            expected.extend_from_slice(&0.5f64.to_le_bytes());
        }
        assert_eq!(bytes_at(&graph, root, 2), expected);
    }

    #[test]
    fn test_unsupported_kind() {
        let mut graph = Graph::new();
        let id = graph.alloc(Value::Unsupported("generator"));
        assert_eq!(
            encode_to_vec(&graph, id, FormatDescriptor::current()),
            Err(EncodeError::Unmarshallable { kind: "generator" })
        );
    }

    #[test]
    fn test_failure_writes_nothing() {
        let mut graph = Graph::new();
        let bad = graph.alloc(Value::Unsupported("module"));
        let ok = graph.int(1);
        let root = graph.list(vec![ok, bad]);

        let mut sink = Vec::new();
        assert!(encode(&graph, root, 5, false, &mut sink).is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_dangling_root() {
        let graph = Graph::new();
        let missing = ObjectId::from_index(100);
        assert_eq!(
            encode_to_vec(&graph, missing, FormatDescriptor::current()),
            Err(EncodeError::DanglingObject { id: missing })
        );
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let mut g1 = Graph::new();
        let items: Vec<_> = [3, 1, 2].iter().map(|&v| g1.int(v)).collect();
        let s1 = g1.frozenset(items);

        let mut g2 = Graph::new();
        let items: Vec<_> = [2, 3, 1].iter().map(|&v| g2.int(v)).collect();
        let s2 = g2.frozenset(items);

        assert_eq!(fingerprint(&g1, s1, 5).unwrap(), fingerprint(&g2, s2, 5).unwrap());
    }
}
