//! Container records: tuples, sequences, mappings, sets and slices.
//!
//! Tuples, sequences, mappings and mutable sets are allocated as empty
//! shells and registered before their children are read, so they may
//! contain themselves. Immutable sets and slices reserve a pending slot and
//! only become resolvable once fully built.

use tracing::trace;

use crate::codec::decoder::Decoder;
use crate::codec::encoder::Encoder;
use crate::codec::primitives::prealloc;
use crate::codec::tag::Tag;
use crate::error::{DecodeError, EncodeError};
use crate::limits::SMALL_TUPLE_LEN;
use crate::model::{ObjectId, Value};

// =============================================================================
// ENCODING
// =============================================================================

impl Encoder<'_> {
    pub(crate) fn write_tuple(
        &mut self,
        items: &[ObjectId],
        flag: bool,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if self.format.has_compact_forms() && items.len() < SMALL_TUPLE_LEN {
            self.out.write_byte(Tag::TupleSmall.byte(flag));
            self.out.write_byte(items.len() as u8);
        } else {
            self.out.write_byte(Tag::Tuple.byte(flag));
            self.out.write_size(items.len())?;
        }
        self.write_items(items, depth)
    }

    pub(crate) fn write_sequence(
        &mut self,
        items: &[ObjectId],
        flag: bool,
        depth: usize,
    ) -> Result<(), EncodeError> {
        self.out.write_byte(Tag::Sequence.byte(flag));
        self.out.write_size(items.len())?;
        self.write_items(items, depth)
    }

    pub(crate) fn write_mapping(
        &mut self,
        entries: &[(ObjectId, ObjectId)],
        flag: bool,
        depth: usize,
    ) -> Result<(), EncodeError> {
        self.out.write_byte(Tag::Mapping.byte(flag));
        for &(key, value) in entries {
            self.write_object(key, depth + 1)?;
            self.write_object(value, depth + 1)?;
        }
        self.out.write_byte(Tag::StopMark.byte(false));
        Ok(())
    }

    /// Writes a set with its elements ordered by their own encodings.
    pub(crate) fn write_set(
        &mut self,
        tag: Tag,
        items: &[ObjectId],
        flag: bool,
        depth: usize,
    ) -> Result<(), EncodeError> {
        self.out.write_byte(tag.byte(flag));
        self.out.write_size(items.len())?;
        if items.len() < 2 {
            return self.write_items(items, depth);
        }
        let ordered = self.sort_elements(items, depth)?;
        self.write_items(&ordered, depth)
    }

    pub(crate) fn write_slice(
        &mut self,
        bounds: [ObjectId; 3],
        flag: bool,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if !self.format.has_slices() {
            return Err(EncodeError::Unmarshallable { kind: "slice" });
        }
        self.out.write_byte(Tag::Slice.byte(flag));
        self.write_items(&bounds, depth)
    }

    fn write_items(&mut self, items: &[ObjectId], depth: usize) -> Result<(), EncodeError> {
        for &item in items {
            self.write_object(item, depth + 1)?;
        }
        Ok(())
    }

    /// Orders elements by the bytes each encodes to in a scratch context.
    ///
    /// The scratch context starts from the current reference table, so an
    /// element already emitted (the set itself included) keys as its
    /// back-reference. The elements are written afterwards in this context.
    fn sort_elements(
        &mut self,
        items: &[ObjectId],
        depth: usize,
    ) -> Result<Vec<ObjectId>, EncodeError> {
        let mut keyed: Vec<(Vec<u8>, ObjectId)> = Vec::new();
        keyed
            .try_reserve_exact(items.len())
            .map_err(|_| EncodeError::OutOfMemory)?;
        for &item in items {
            keyed.push((self.sort_key(item, depth + 1)?, item));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let ordered: Vec<ObjectId> = keyed.into_iter().map(|(_, id)| id).collect();
        if ordered != items {
            trace!(elements = items.len(), "reordered set elements");
        }
        Ok(ordered)
    }

    /// Scratch encoding of `item`.
    ///
    /// A subtree that reaches no shared object encodes the same way in any
    /// context, so its key is cached for the rest of the call.
    fn sort_key(&mut self, item: ObjectId, depth: usize) -> Result<Vec<u8>, EncodeError> {
        if let Some(key) = self.keys.get(&item) {
            return Ok(key.clone());
        }
        let mut scratch = self.scratch();
        let result = scratch.write_object(item, depth);
        self.reclaim_keys(&mut scratch);
        result?;

        let key = scratch.out.into_bytes();
        if scratch.ref_lookups == 0 {
            self.keys.insert(item, key.clone());
        }
        Ok(key)
    }
}

// =============================================================================
// DECODING
// =============================================================================

impl Decoder<'_, '_> {
    pub(crate) fn read_tuple(
        &mut self,
        small: bool,
        flag: bool,
        depth: usize,
    ) -> Result<ObjectId, DecodeError> {
        let count = if small {
            self.input.read_byte("tuple size")? as usize
        } else {
            self.input.read_size("tuple")?
        };
        let id = self.finish(Value::Tuple(Vec::new()), flag)?;
        let items = self.read_items(count, depth)?;
        self.graph.replace(id, Value::Tuple(items));
        Ok(id)
    }

    pub(crate) fn read_sequence(
        &mut self,
        flag: bool,
        depth: usize,
    ) -> Result<ObjectId, DecodeError> {
        let count = self.input.read_size("sequence")?;
        let id = self.finish(Value::Sequence(Vec::new()), flag)?;
        let items = self.read_items(count, depth)?;
        self.graph.replace(id, Value::Sequence(items));
        Ok(id)
    }

    pub(crate) fn read_mapping(
        &mut self,
        flag: bool,
        depth: usize,
    ) -> Result<ObjectId, DecodeError> {
        let id = self.finish(Value::Mapping(Vec::new()), flag)?;
        let mut entries = Vec::new();
        while let Some(key) = self.read_entry(depth + 1)? {
            let value = self.read_object(depth + 1)?;
            entries.push((key, value));
        }
        self.graph.replace(id, Value::Mapping(entries));
        Ok(id)
    }

    pub(crate) fn read_mutable_set(
        &mut self,
        flag: bool,
        depth: usize,
    ) -> Result<ObjectId, DecodeError> {
        let count = self.input.read_size("set")?;
        let id = self.finish(Value::MutableSet(Vec::new()), flag)?;
        let items = self.read_items(count, depth)?;
        self.graph.replace(id, Value::MutableSet(items));
        Ok(id)
    }

    pub(crate) fn read_immutable_set(
        &mut self,
        flag: bool,
        depth: usize,
    ) -> Result<ObjectId, DecodeError> {
        let count = self.input.read_size("frozenset")?;
        let slot = self.reserve_if(flag)?;
        let items = self.read_items(count, depth)?;
        self.complete(slot, Value::ImmutableSet(items))
    }

    pub(crate) fn read_slice(&mut self, flag: bool, depth: usize) -> Result<ObjectId, DecodeError> {
        let slot = self.reserve_if(flag)?;
        let start = self.read_object(depth + 1)?;
        let stop = self.read_object(depth + 1)?;
        let step = self.read_object(depth + 1)?;
        self.complete(slot, Value::Slice { start, stop, step })
    }

    fn read_items(&mut self, count: usize, depth: usize) -> Result<Vec<ObjectId>, DecodeError> {
        let mut items = Vec::with_capacity(prealloc(count));
        for _ in 0..count {
            items.push(self.read_object(depth + 1)?);
        }
        Ok(items)
    }
}
