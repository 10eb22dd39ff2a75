//! Reference tables for shared and cyclic objects.
//!
//! The writer assigns indices in first-emission order and the reader appends
//! in first-read order, so both sides agree on every index without the
//! table ever being written out.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_REFS;
use crate::model::{Graph, ObjectId, Value};

// =============================================================================
// WRITE SIDE
// =============================================================================

/// In-edge counts for every object reachable from a root.
///
/// An object is shared when it is reachable through more than one edge
/// (the root counts one edge for the caller's handle) or when it is an
/// interned text.
#[derive(Debug, Clone, Default)]
pub struct ShareCounts {
    counts: FxHashMap<ObjectId, u32>,
}

impl ShareCounts {
    /// Walks the graph from `root`, counting edges.
    ///
    /// Iterative, so arbitrarily deep graphs are counted without recursion.
    pub fn analyze(graph: &Graph, root: ObjectId) -> Result<Self, EncodeError> {
        let mut counts: FxHashMap<ObjectId, u32> = FxHashMap::default();
        let mut visited: FxHashSet<ObjectId> = FxHashSet::default();
        let mut stack = vec![root];
        *counts.entry(root).or_default() += 1;

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let value = graph.get(id).ok_or(EncodeError::DanglingObject { id })?;
            value.for_each_child(|child| {
                *counts.entry(child).or_default() += 1;
                stack.push(child);
            });
        }
        Ok(Self { counts })
    }

    /// Returns the number of edges into `id`.
    pub fn count(&self, id: ObjectId) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Returns true if `value` at `id` should be reference-tracked.
    pub fn is_shared(&self, id: ObjectId, value: &Value) -> bool {
        if value.is_singleton() {
            return false;
        }
        match value {
            Value::Text(text) if text.interned => true,
            _ => self.count(id) > 1,
        }
    }
}

/// Writer-side table from object identity to reference index.
#[derive(Debug, Clone, Default)]
pub struct WriteRefs {
    indices: FxHashMap<ObjectId, u32>,
}

impl WriteRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(index)` if `id` was already emitted.
    ///
    /// Otherwise assigns the next index to `id` and returns `None`; the
    /// caller then writes the full payload with the reference flag set.
    pub fn register(&mut self, id: ObjectId) -> Result<Option<u32>, EncodeError> {
        if let Some(&index) = self.indices.get(&id) {
            return Ok(Some(index));
        }
        if self.indices.len() >= MAX_REFS {
            return Err(EncodeError::TooManyReferences);
        }
        let index = self.indices.len() as u32;
        self.indices.insert(id, index);
        Ok(None)
    }

    /// Returns the number of objects registered.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

// =============================================================================
// READ SIDE
// =============================================================================

/// Reader-side list of referenceable objects in first-read order.
///
/// Slots point into the graph; a slot whose node is still
/// [`Value::Pending`] is reserved but not yet built.
#[derive(Debug, Clone, Default)]
pub struct ReadRefs {
    slots: Vec<ObjectId>,
}

impl ReadRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pending node to `graph` and a slot for it.
    pub fn reserve(&mut self, graph: &mut Graph) -> Result<(usize, ObjectId), DecodeError> {
        self.check_capacity()?;
        let id = graph.reserve();
        self.slots.push(id);
        Ok((self.slots.len() - 1, id))
    }

    /// Appends a slot for an object that already exists.
    pub fn register(&mut self, id: ObjectId) -> Result<usize, DecodeError> {
        self.check_capacity()?;
        self.slots.push(id);
        Ok(self.slots.len() - 1)
    }

    /// Fills a reserved slot with its finished value.
    pub fn fill(
        &self,
        graph: &mut Graph,
        index: usize,
        value: Value,
    ) -> Result<ObjectId, DecodeError> {
        let id = *self.slots.get(index).ok_or(DecodeError::BadReference {
            index: index as i64,
            size: self.slots.len(),
        })?;
        graph.replace(id, value);
        Ok(id)
    }

    /// Resolves a back-reference index.
    pub fn resolve(&self, graph: &Graph, index: i32) -> Result<ObjectId, DecodeError> {
        let bad = DecodeError::BadReference {
            index: i64::from(index),
            size: self.slots.len(),
        };
        let slot = usize::try_from(index).map_err(|_| bad.clone())?;
        let id = *self.slots.get(slot).ok_or_else(|| bad.clone())?;
        match graph.get(id) {
            Some(Value::Pending) | None => Err(bad),
            Some(_) => Ok(id),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn check_capacity(&self) -> Result<(), DecodeError> {
        if self.slots.len() >= MAX_REFS {
            return Err(DecodeError::UnsupportedSize);
        }
        Ok(())
    }
}
