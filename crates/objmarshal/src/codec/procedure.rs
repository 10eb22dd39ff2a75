//! Procedure record encoding and decoding.
//!
//! Layout: five raw i32 scalars (argument counts, stack size, flags), eight
//! nested values (code through qualified name), the raw i32 first line, then
//! the line table and exception table.
//!
//! Both directions refuse the record outright unless code is allowed; the
//! reader does so before touching the payload.

use tracing::debug;

use crate::codec::decoder::Decoder;
use crate::codec::encoder::Encoder;
use crate::codec::tag::Tag;
use crate::error::{DecodeError, EncodeError};
use crate::model::{ObjectId, ProcedureRecord, Value};

// =============================================================================
// ENCODING
// =============================================================================

impl Encoder<'_> {
    pub(crate) fn write_procedure(
        &mut self,
        record: &ProcedureRecord,
        flag: bool,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if !self.format.allow_code() {
            return Err(EncodeError::CodeNotAllowed);
        }
        if let Err(reason) = record.validate(self.graph) {
            debug!(reason, "refusing invalid procedure record");
            return Err(EncodeError::Unmarshallable {
                kind: "procedure record",
            });
        }
        self.out.write_byte(Tag::ProcedureRecord.byte(flag));
        self.out.write_i32(record.arg_count);
        self.out.write_i32(record.positional_only_arg_count);
        self.out.write_i32(record.keyword_only_arg_count);
        self.out.write_i32(record.stack_size);
        self.out.write_i32(record.flags);
        for id in [
            record.code,
            record.constants,
            record.names,
            record.local_names,
            record.local_kinds,
            record.filename,
            record.name,
            record.qualified_name,
        ] {
            self.write_object(id, depth + 1)?;
        }
        self.out.write_i32(record.first_line);
        self.write_object(record.line_table, depth + 1)?;
        self.write_object(record.exception_table, depth + 1)
    }
}

// =============================================================================
// DECODING
// =============================================================================

impl Decoder<'_, '_> {
    pub(crate) fn read_procedure(
        &mut self,
        flag: bool,
        depth: usize,
    ) -> Result<ObjectId, DecodeError> {
        if !self.allow_code {
            return Err(DecodeError::CodeNotAllowed);
        }
        let slot = self.reserve_if(flag)?;

        let arg_count = self.input.read_i32("arg count")?;
        let positional_only_arg_count = self.input.read_i32("positional-only arg count")?;
        let keyword_only_arg_count = self.input.read_i32("keyword-only arg count")?;
        let stack_size = self.input.read_i32("stack size")?;
        let flags = self.input.read_i32("flags")?;
        let code = self.read_object(depth + 1)?;
        let constants = self.read_object(depth + 1)?;
        let names = self.read_object(depth + 1)?;
        let local_names = self.read_object(depth + 1)?;
        let local_kinds = self.read_object(depth + 1)?;
        let filename = self.read_object(depth + 1)?;
        let name = self.read_object(depth + 1)?;
        let qualified_name = self.read_object(depth + 1)?;
        let first_line = self.input.read_i32("first line")?;
        let line_table = self.read_object(depth + 1)?;
        let exception_table = self.read_object(depth + 1)?;

        let record = ProcedureRecord {
            arg_count,
            positional_only_arg_count,
            keyword_only_arg_count,
            stack_size,
            flags,
            code,
            constants,
            names,
            local_names,
            local_kinds,
            filename,
            name,
            qualified_name,
            first_line,
            line_table,
            exception_table,
        };
        record
            .validate(self.graph)
            .map_err(|reason| DecodeError::InvalidProcedureRecord { reason })?;
        self.complete(slot, Value::ProcedureRecord(Box::new(record)))
    }
}
