//! Arena-backed object graphs.
//!
//! A [`Graph`] owns every node; containers refer to children by [`ObjectId`].
//! Identity is the id, never the content, so two equal texts at different
//! ids are two objects.

use num_bigint::BigInt;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{ProcedureRecord, Text, Value};

/// Index of a node within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Creates an id from a raw slot index.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Canonicalization table for interned texts.
///
/// Maps text content to the single node that represents it.
#[derive(Debug, Clone, Default)]
pub struct InterningTable {
    ids: FxHashMap<String, ObjectId>,
}

impl InterningTable {
    /// Looks up the node for an interned text.
    pub fn get(&self, value: &str) -> Option<ObjectId> {
        self.ids.get(value).copied()
    }

    /// Returns the number of interned texts.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn insert(&mut self, value: String, id: ObjectId) {
        self.ids.insert(value, id);
    }

    fn forget_from(&mut self, first_dropped: usize) {
        self.ids.retain(|_, id| id.0 < first_dropped);
    }
}

/// Position in a graph that [`Graph::rollback`] can return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphMark(usize);

/// An arena of values.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Value>,
    interned: InterningTable,
}

const UNIT_ID: ObjectId = ObjectId(0);
const FALSE_ID: ObjectId = ObjectId(1);
const TRUE_ID: ObjectId = ObjectId(2);
const ELLIPSIS_ID: ObjectId = ObjectId(3);

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates a graph holding only the singleton nodes.
    pub fn new() -> Self {
        Self {
            nodes: vec![Value::Unit, Value::Bool(false), Value::Bool(true), Value::Ellipsis],
            interned: InterningTable::default(),
        }
    }

    /// Returns the number of nodes, singletons included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph holds only the singleton nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= ELLIPSIS_ID.0 + 1
    }

    /// Returns the value at `id`.
    pub fn get(&self, id: ObjectId) -> Option<&Value> {
        self.nodes.get(id.0)
    }

    /// Returns the interning table.
    pub fn interning(&self) -> &InterningTable {
        &self.interned
    }

    /// Iterates over all nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Value)> {
        self.nodes.iter().enumerate().map(|(i, v)| (ObjectId(i), v))
    }

    /// Adds a value and returns its id.
    ///
    /// Singletons map to their shared nodes and interned texts to their
    /// canonical node, so this never creates a second `Unit` or a second
    /// interned node for the same content.
    pub fn alloc(&mut self, value: Value) -> ObjectId {
        match value {
            Value::Unit => UNIT_ID,
            Value::Bool(false) => FALSE_ID,
            Value::Bool(true) => TRUE_ID,
            Value::Ellipsis => ELLIPSIS_ID,
            Value::Text(Text { value, interned: true }) => self.intern_owned(value),
            other => self.push(other),
        }
    }

    fn push(&mut self, value: Value) -> ObjectId {
        let id = ObjectId(self.nodes.len());
        self.nodes.push(value);
        id
    }

    /// Overwrites the value at `id`, returning the previous value.
    pub fn replace(&mut self, id: ObjectId, value: Value) -> Option<Value> {
        self.nodes
            .get_mut(id.0)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// Appends `item` to a sequence or mutable set.
    ///
    /// Returns false if `container` is not one of those kinds.
    pub fn push_item(&mut self, container: ObjectId, item: ObjectId) -> bool {
        match self.nodes.get_mut(container.0) {
            Some(Value::Sequence(items)) | Some(Value::MutableSet(items)) => {
                items.push(item);
                true
            }
            _ => false,
        }
    }

    /// Appends a key/value pair to a mapping.
    ///
    /// Returns false if `mapping` is not a mapping.
    pub fn insert_entry(&mut self, mapping: ObjectId, key: ObjectId, value: ObjectId) -> bool {
        match self.nodes.get_mut(mapping.0) {
            Some(Value::Mapping(entries)) => {
                entries.push((key, value));
                true
            }
            _ => false,
        }
    }

    pub fn none(&self) -> ObjectId {
        UNIT_ID
    }

    pub fn bool(&self, value: bool) -> ObjectId {
        if value { TRUE_ID } else { FALSE_ID }
    }

    pub fn ellipsis(&self) -> ObjectId {
        ELLIPSIS_ID
    }

    pub fn int(&mut self, value: i64) -> ObjectId {
        self.push(Value::Int(value))
    }

    /// Adds an integer in canonical form.
    pub fn bigint(&mut self, value: BigInt) -> ObjectId {
        self.push(Value::integer(value))
    }

    pub fn float(&mut self, value: f64) -> ObjectId {
        self.push(Value::Float(value))
    }

    pub fn complex(&mut self, real: f64, imag: f64) -> ObjectId {
        self.push(Value::Complex { real, imag })
    }

    pub fn bytes(&mut self, value: impl Into<Vec<u8>>) -> ObjectId {
        self.push(Value::Bytes(value.into()))
    }

    /// Adds a plain text. Every call creates a new object.
    pub fn text(&mut self, value: impl Into<String>) -> ObjectId {
        self.push(Value::Text(Text::new(value)))
    }

    /// Returns the canonical node for an interned text, creating it once.
    pub fn intern(&mut self, value: &str) -> ObjectId {
        match self.interned.get(value) {
            Some(id) => id,
            None => self.intern_owned(value.to_string()),
        }
    }

    fn intern_owned(&mut self, value: String) -> ObjectId {
        if let Some(id) = self.interned.get(&value) {
            return id;
        }
        let id = self.push(Value::Text(Text::interned(value.clone())));
        self.interned.insert(value, id);
        id
    }

    pub fn tuple(&mut self, items: Vec<ObjectId>) -> ObjectId {
        self.push(Value::Tuple(items))
    }

    pub fn list(&mut self, items: Vec<ObjectId>) -> ObjectId {
        self.push(Value::Sequence(items))
    }

    pub fn dict(&mut self, entries: Vec<(ObjectId, ObjectId)>) -> ObjectId {
        self.push(Value::Mapping(entries))
    }

    pub fn set(&mut self, items: Vec<ObjectId>) -> ObjectId {
        self.push(Value::MutableSet(items))
    }

    pub fn frozenset(&mut self, items: Vec<ObjectId>) -> ObjectId {
        self.push(Value::ImmutableSet(items))
    }

    pub fn slice(&mut self, start: ObjectId, stop: ObjectId, step: ObjectId) -> ObjectId {
        self.push(Value::Slice { start, stop, step })
    }

    pub fn procedure(&mut self, record: ProcedureRecord) -> ObjectId {
        self.push(Value::ProcedureRecord(Box::new(record)))
    }

    /// Reserves a node that will be filled in later with [`Graph::replace`].
    pub fn reserve(&mut self) -> ObjectId {
        self.push(Value::Pending)
    }

    /// Returns a mark for the current end of the graph.
    pub fn mark(&self) -> GraphMark {
        GraphMark(self.nodes.len())
    }

    /// Drops every node allocated after `mark`, including interning entries.
    pub fn rollback(&mut self, mark: GraphMark) {
        let keep = mark.0.max(ELLIPSIS_ID.0 + 1);
        if keep < self.nodes.len() {
            self.nodes.truncate(keep);
            self.interned.forget_from(keep);
        }
    }

    /// Structural equality between `a` in this graph and `b` in `other`.
    ///
    /// Cycles are handled by assuming a pair equal while it is being
    /// compared. Floats compare by bit pattern, integers by numeric value,
    /// tuples and sequences in order, mappings and sets without regard to
    /// order. The comparison recurses once per nesting level.
    pub fn deep_eq(&self, a: ObjectId, other: &Graph, b: ObjectId) -> bool {
        let mut assumed = FxHashSet::default();
        self.deep_eq_inner(a, other, b, &mut assumed)
    }

    fn deep_eq_inner(
        &self,
        a: ObjectId,
        other: &Graph,
        b: ObjectId,
        assumed: &mut FxHashSet<(ObjectId, ObjectId)>,
    ) -> bool {
        if !assumed.insert((a, b)) {
            return true;
        }
        let (Some(x), Some(y)) = (self.get(a), other.get(b)) else {
            assumed.remove(&(a, b));
            return false;
        };
        let equal = match (x, y) {
            (Value::Int(p), Value::BigInt(q)) | (Value::BigInt(q), Value::Int(p)) => {
                BigInt::from(*p) == *q
            }
            (Value::Float(p), Value::Float(q)) => p.to_bits() == q.to_bits(),
            (
                Value::Complex { real: pr, imag: pi },
                Value::Complex { real: qr, imag: qi },
            ) => pr.to_bits() == qr.to_bits() && pi.to_bits() == qi.to_bits(),
            (Value::Text(p), Value::Text(q)) => p.value == q.value,
            (Value::Tuple(p), Value::Tuple(q)) | (Value::Sequence(p), Value::Sequence(q)) => {
                p.len() == q.len()
                    && p
                        .iter()
                        .zip(q)
                        .all(|(&i, &j)| self.deep_eq_inner(i, other, j, assumed))
            }
            (Value::MutableSet(p), Value::MutableSet(q))
            | (Value::ImmutableSet(p), Value::ImmutableSet(q)) => {
                self.unordered_eq(p, other, q, assumed)
            }
            (Value::Mapping(p), Value::Mapping(q)) => self.entries_eq(p, other, q, assumed),
            (
                Value::Slice { start: s1, stop: e1, step: t1 },
                Value::Slice { start: s2, stop: e2, step: t2 },
            ) => {
                self.deep_eq_inner(*s1, other, *s2, assumed)
                    && self.deep_eq_inner(*e1, other, *e2, assumed)
                    && self.deep_eq_inner(*t1, other, *t2, assumed)
            }
            (Value::ProcedureRecord(p), Value::ProcedureRecord(q)) => {
                p.arg_count == q.arg_count
                    && p.positional_only_arg_count == q.positional_only_arg_count
                    && p.keyword_only_arg_count == q.keyword_only_arg_count
                    && p.stack_size == q.stack_size
                    && p.flags == q.flags
                    && p.first_line == q.first_line
                    && p.fields()
                        .iter()
                        .zip(q.fields().iter())
                        .all(|(&i, &j)| self.deep_eq_inner(i, other, j, assumed))
            }
            (p, q) => p == q,
        };
        if !equal {
            assumed.remove(&(a, b));
        }
        equal
    }

    fn unordered_eq(
        &self,
        p: &[ObjectId],
        other: &Graph,
        q: &[ObjectId],
        assumed: &mut FxHashSet<(ObjectId, ObjectId)>,
    ) -> bool {
        if p.len() != q.len() {
            return false;
        }
        let mut used = vec![false; q.len()];
        p.iter().all(|&i| {
            let found = q.iter().enumerate().position(|(k, &j)| {
                !used[k] && self.deep_eq_inner(i, other, j, assumed)
            });
            match found {
                Some(k) => {
                    used[k] = true;
                    true
                }
                None => false,
            }
        })
    }

    fn entries_eq(
        &self,
        p: &[(ObjectId, ObjectId)],
        other: &Graph,
        q: &[(ObjectId, ObjectId)],
        assumed: &mut FxHashSet<(ObjectId, ObjectId)>,
    ) -> bool {
        if p.len() != q.len() {
            return false;
        }
        let mut used = vec![false; q.len()];
        p.iter().all(|&(pk, pv)| {
            let found = q.iter().enumerate().position(|(k, &(qk, qv))| {
                !used[k]
                    && self.deep_eq_inner(pk, other, qk, assumed)
                    && self.deep_eq_inner(pv, other, qv, assumed)
            });
            match found {
                Some(k) => {
                    used[k] = true;
                    true
                }
                None => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_are_shared() {
        let mut graph = Graph::new();
        assert_eq!(graph.alloc(Value::Unit), graph.none());
        assert_eq!(graph.alloc(Value::Bool(true)), graph.bool(true));
        assert_eq!(graph.alloc(Value::Ellipsis), graph.ellipsis());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_intern_returns_same_id() {
        let mut graph = Graph::new();
        let a = graph.intern("name");
        let b = graph.intern("name");
        let c = graph.alloc(Value::Text(Text::interned("name")));
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(graph.interning().len(), 1);

        // Plain text is never canonicalized.
        let d = graph.text("name");
        let e = graph.text("name");
        assert_ne!(d, e);
    }

    #[test]
    fn test_push_item_builds_cycle() {
        let mut graph = Graph::new();
        let list = graph.list(Vec::new());
        assert!(graph.push_item(list, list));
        assert_eq!(graph.get(list), Some(&Value::Sequence(vec![list])));

        let not_a_list = graph.int(1);
        assert!(!graph.push_item(not_a_list, list));
    }

    #[test]
    fn test_rollback_forgets_interned() {
        let mut graph = Graph::new();
        let kept = graph.intern("kept");
        let mark = graph.mark();
        graph.intern("dropped");
        graph.int(7);
        graph.rollback(mark);

        assert_eq!(graph.mark(), mark);
        assert_eq!(graph.interning().get("kept"), Some(kept));
        assert_eq!(graph.interning().get("dropped"), None);
    }

    #[test]
    fn test_deep_eq_cycles() {
        let mut g1 = Graph::new();
        let l1 = g1.list(Vec::new());
        g1.push_item(l1, l1);

        let mut g2 = Graph::new();
        let l2 = g2.list(Vec::new());
        g2.push_item(l2, l2);

        assert!(g1.deep_eq(l1, &g2, l2));
    }

    #[test]
    fn test_deep_eq_sets_unordered() {
        let mut g1 = Graph::new();
        let items: Vec<_> = ["a", "bb", "ccc"].iter().map(|s| g1.text(*s)).collect();
        let s1 = g1.set(items);

        let mut g2 = Graph::new();
        let items: Vec<_> = ["ccc", "a", "bb"].iter().map(|s| g2.text(*s)).collect();
        let s2 = g2.set(items);

        assert!(g1.deep_eq(s1, &g2, s2));

        let f2 = g2.frozenset(Vec::new());
        assert!(!g1.deep_eq(s1, &g2, f2));
    }

    #[test]
    fn test_deep_eq_floats_by_bits() {
        let mut graph = Graph::new();
        let a = graph.float(0.0);
        let b = graph.float(-0.0);
        let n1 = graph.float(f64::NAN);
        let n2 = graph.float(f64::NAN);
        assert!(!graph.deep_eq(a, &graph, b));
        assert!(graph.deep_eq(n1, &graph, n2));
    }

    #[test]
    fn test_deep_eq_int_forms() {
        let mut graph = Graph::new();
        let small = graph.int(5);
        let big = graph.alloc(Value::BigInt(BigInt::from(5)));
        assert!(graph.deep_eq(small, &graph, big));
    }
}
