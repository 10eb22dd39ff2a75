//! Compiled procedure records.
//!
//! The codec treats a record as a fixed sequence of fields. Scalar fields are
//! raw 32-bit integers on the wire; every other field is a nested value.
//!
//! # Example
//!
//! ```rust
//! use objmarshal::model::{Graph, ProcedureBuilder};
//!
//! let mut graph = Graph::new();
//! let one = graph.int(1);
//! let record = ProcedureBuilder::new(&mut graph, "add_one")
//!     .arg_count(1)
//!     .stack_size(2)
//!     .code(vec![0x97, 0x00, 0x7c, 0x00])
//!     .constants(vec![one])
//!     .locals(&[("x", 0x26)])
//!     .filename("math.src")
//!     .first_line(3)
//!     .build();
//! assert!(graph.get(record).is_some());
//! ```

use crate::model::{Graph, ObjectId, Value};

/// Number of nested-value fields in a record.
pub const PROCEDURE_VALUE_FIELDS: usize = 10;

/// An opaque compiled procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRecord {
    pub arg_count: i32,
    pub positional_only_arg_count: i32,
    pub keyword_only_arg_count: i32,
    pub stack_size: i32,
    pub flags: i32,
    /// Executable form (bytes).
    pub code: ObjectId,
    /// Constants (tuple).
    pub constants: ObjectId,
    /// Referenced global names (tuple of text).
    pub names: ObjectId,
    /// Local variable names (tuple of text).
    pub local_names: ObjectId,
    /// One kind byte per local name (bytes).
    pub local_kinds: ObjectId,
    pub filename: ObjectId,
    pub name: ObjectId,
    pub qualified_name: ObjectId,
    pub first_line: i32,
    /// Source location table (bytes).
    pub line_table: ObjectId,
    /// Exception handling table (bytes).
    pub exception_table: ObjectId,
}

impl ProcedureRecord {
    /// Returns the nested-value fields in wire order.
    pub fn fields(&self) -> [ObjectId; PROCEDURE_VALUE_FIELDS] {
        [
            self.code,
            self.constants,
            self.names,
            self.local_names,
            self.local_kinds,
            self.filename,
            self.name,
            self.qualified_name,
            self.line_table,
            self.exception_table,
        ]
    }

    /// Checks field kinds and counts against `graph`.
    ///
    /// The writer and the reader both run this, so any record that encodes
    /// also decodes. The error is a short reason for diagnostics.
    pub fn validate(&self, graph: &Graph) -> Result<(), &'static str> {
        if self.arg_count < 0
            || self.positional_only_arg_count < 0
            || self.keyword_only_arg_count < 0
            || self.stack_size < 0
        {
            return Err("negative count");
        }
        if !matches!(graph.get(self.code), Some(Value::Bytes(_))) {
            return Err("code is not bytes");
        }
        if !matches!(graph.get(self.constants), Some(Value::Tuple(_))) {
            return Err("constants is not a tuple");
        }
        if text_tuple_len(graph, self.names).is_none() {
            return Err("names is not a tuple of text");
        }
        let Some(local_count) = text_tuple_len(graph, self.local_names) else {
            return Err("local names is not a tuple of text");
        };
        match graph.get(self.local_kinds) {
            Some(Value::Bytes(kinds)) if kinds.len() == local_count => {}
            Some(Value::Bytes(_)) => return Err("local kinds length mismatch"),
            _ => return Err("local kinds is not bytes"),
        }
        for id in [self.filename, self.name, self.qualified_name] {
            if !matches!(graph.get(id), Some(Value::Text(_))) {
                return Err("name field is not text");
            }
        }
        for id in [self.line_table, self.exception_table] {
            if !matches!(graph.get(id), Some(Value::Bytes(_))) {
                return Err("table is not bytes");
            }
        }
        Ok(())
    }
}

fn text_tuple_len(graph: &Graph, id: ObjectId) -> Option<usize> {
    match graph.get(id) {
        Some(Value::Tuple(items))
            if items
                .iter()
                .all(|&item| matches!(graph.get(item), Some(Value::Text(_)))) =>
        {
            Some(items.len())
        }
        _ => None,
    }
}

/// Builder for procedure records.
///
/// Fields that are not set get empty defaults allocated in the graph.
#[derive(Debug)]
pub struct ProcedureBuilder<'g> {
    graph: &'g mut Graph,
    record: ProcedureRecord,
}

impl<'g> ProcedureBuilder<'g> {
    /// Starts a record named `name`, allocating defaults in `graph`.
    pub fn new(graph: &'g mut Graph, name: &str) -> Self {
        let code = graph.bytes(Vec::new());
        let constants = graph.tuple(Vec::new());
        let names = graph.tuple(Vec::new());
        let local_names = graph.tuple(Vec::new());
        let local_kinds = graph.bytes(Vec::new());
        let filename = graph.text("<unknown>");
        let name = graph.intern(name);
        let line_table = graph.bytes(Vec::new());
        let exception_table = graph.bytes(Vec::new());
        Self {
            graph,
            record: ProcedureRecord {
                arg_count: 0,
                positional_only_arg_count: 0,
                keyword_only_arg_count: 0,
                stack_size: 0,
                flags: 0,
                code,
                constants,
                names,
                local_names,
                local_kinds,
                filename,
                name,
                qualified_name: name,
                first_line: 1,
                line_table,
                exception_table,
            },
        }
    }

    /// Sets the positional argument count.
    pub fn arg_count(mut self, count: i32) -> Self {
        self.record.arg_count = count;
        self
    }

    /// Sets the positional-only argument count.
    pub fn positional_only_arg_count(mut self, count: i32) -> Self {
        self.record.positional_only_arg_count = count;
        self
    }

    /// Sets the keyword-only argument count.
    pub fn keyword_only_arg_count(mut self, count: i32) -> Self {
        self.record.keyword_only_arg_count = count;
        self
    }

    /// Sets the stack size hint.
    pub fn stack_size(mut self, size: i32) -> Self {
        self.record.stack_size = size;
        self
    }

    /// Sets the flag bits.
    pub fn flags(mut self, flags: i32) -> Self {
        self.record.flags = flags;
        self
    }

    /// Sets the executable bytes.
    pub fn code(mut self, code: Vec<u8>) -> Self {
        self.record.code = self.graph.bytes(code);
        self
    }

    /// Sets the constants tuple.
    pub fn constants(mut self, constants: Vec<ObjectId>) -> Self {
        self.record.constants = self.graph.tuple(constants);
        self
    }

    /// Sets the referenced names (interned).
    pub fn names(mut self, names: &[&str]) -> Self {
        let ids = names.iter().map(|n| self.graph.intern(n)).collect();
        self.record.names = self.graph.tuple(ids);
        self
    }

    /// Sets the local variables as `(name, kind)` pairs.
    pub fn locals(mut self, locals: &[(&str, u8)]) -> Self {
        let ids = locals.iter().map(|(n, _)| self.graph.intern(n)).collect();
        let kinds: Vec<u8> = locals.iter().map(|(_, k)| *k).collect();
        self.record.local_names = self.graph.tuple(ids);
        self.record.local_kinds = self.graph.bytes(kinds);
        self
    }

    /// Sets the source file name.
    pub fn filename(mut self, filename: &str) -> Self {
        self.record.filename = self.graph.text(filename);
        self
    }

    /// Sets the qualified name (interned).
    pub fn qualified_name(mut self, qualified_name: &str) -> Self {
        self.record.qualified_name = self.graph.intern(qualified_name);
        self
    }

    /// Sets the first source line.
    pub fn first_line(mut self, line: i32) -> Self {
        self.record.first_line = line;
        self
    }

    /// Sets the line table bytes.
    pub fn line_table(mut self, table: Vec<u8>) -> Self {
        self.record.line_table = self.graph.bytes(table);
        self
    }

    /// Sets the exception table bytes.
    pub fn exception_table(mut self, table: Vec<u8>) -> Self {
        self.record.exception_table = self.graph.bytes(table);
        self
    }

    /// Allocates the record and returns its id.
    pub fn build(self) -> ObjectId {
        self.graph.procedure(self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let mut graph = Graph::new();
        let id = ProcedureBuilder::new(&mut graph, "f").build();

        let Some(Value::ProcedureRecord(record)) = graph.get(id).cloned() else {
            panic!("expected a procedure record");
        };
        assert_eq!(record.arg_count, 0);
        assert_eq!(record.first_line, 1);
        assert_eq!(record.name, record.qualified_name);
        assert_eq!(graph.get(record.name).and_then(Value::as_str), Some("f"));
        assert_eq!(graph.get(record.code), Some(&Value::Bytes(Vec::new())));
    }

    #[test]
    fn test_builder_locals() {
        let mut graph = Graph::new();
        let id = ProcedureBuilder::new(&mut graph, "f")
            .locals(&[("a", 1), ("b", 2)])
            .build();

        let Some(Value::ProcedureRecord(record)) = graph.get(id).cloned() else {
            panic!("expected a procedure record");
        };
        assert_eq!(graph.get(record.local_kinds), Some(&Value::Bytes(vec![1, 2])));
        let Some(Value::Tuple(names)) = graph.get(record.local_names).cloned() else {
            panic!("expected a tuple");
        };
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], graph.intern("a"));
    }

    #[test]
    fn test_validate() {
        let mut graph = Graph::new();
        let id = ProcedureBuilder::new(&mut graph, "f")
            .names(&["g"])
            .locals(&[("a", 1)])
            .build();
        let Some(Value::ProcedureRecord(record)) = graph.get(id).cloned() else {
            panic!("expected a procedure record");
        };
        assert_eq!(record.validate(&graph), Ok(()));

        let list = graph.list(Vec::new());
        let bad = ProcedureRecord { constants: list, ..*record.clone() };
        assert_eq!(bad.validate(&graph), Err("constants is not a tuple"));

        let bad = ProcedureRecord { stack_size: -1, ..*record.clone() };
        assert_eq!(bad.validate(&graph), Err("negative count"));

        let number = graph.int(3);
        let names = graph.tuple(vec![number]);
        let bad = ProcedureRecord { names, ..*record };
        assert_eq!(bad.validate(&graph), Err("names is not a tuple of text"));
    }

    #[test]
    fn test_fields_order() {
        let mut graph = Graph::new();
        let id = ProcedureBuilder::new(&mut graph, "f").build();
        let Some(Value::ProcedureRecord(record)) = graph.get(id).cloned() else {
            panic!("expected a procedure record");
        };
        let fields = record.fields();
        assert_eq!(fields[0], record.code);
        assert_eq!(fields[PROCEDURE_VALUE_FIELDS - 1], record.exception_table);
    }
}
