//! Error types for encoding and decoding.

use thiserror::Error;

use crate::model::ObjectId;

/// Coarse categories for decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The stream ended before a record was complete.
    Truncated,
    /// A back-reference did not resolve to a finished object.
    BadReference,
    /// The bytes do not form a valid record.
    Malformed,
    /// The record is well-formed but not allowed by the caller.
    Forbidden,
    /// A nesting or size limit was exceeded.
    Limit,
    /// The byte source failed or broke its contract.
    Io,
}

impl ErrorCode {
    /// Returns a short stable name for the category.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::Truncated => "truncated",
            ErrorCode::BadReference => "bad-reference",
            ErrorCode::Malformed => "malformed",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::Limit => "limit",
            ErrorCode::Io => "io",
        }
    }
}

/// Error while reading a serialized object graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("bad reference: index {index} (table size {size}) is out of range or not yet built")]
    BadReference { index: i64, size: usize },

    #[error("malformed integer: {reason}")]
    MalformedInteger { reason: &'static str },

    #[error("{context} size {size} out of range")]
    MalformedSize { context: &'static str, size: i64 },

    #[error("unknown tag {tag:#04x}")]
    UnknownTag { tag: u8 },

    #[error("byte source returned {returned} bytes, {requested} requested")]
    WrongSourceBehavior { requested: usize, returned: usize },

    #[error("procedure records are not allowed")]
    CodeNotAllowed,

    #[error("recursion limit exceeded at depth {depth}")]
    RecursionTooDeep { depth: usize },

    #[error("reference table too large")]
    UnsupportedSize,

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("malformed decimal float text")]
    MalformedFloat,

    #[error("stop mark outside of a mapping")]
    UnexpectedStopMark,

    #[error("invalid procedure record: {reason}")]
    InvalidProcedureRecord { reason: &'static str },

    #[error("byte source failed: {0}")]
    Source(String),
}

impl DecodeError {
    /// Returns the category for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::UnexpectedEof { .. } => ErrorCode::Truncated,
            DecodeError::BadReference { .. } => ErrorCode::BadReference,
            DecodeError::CodeNotAllowed => ErrorCode::Forbidden,
            DecodeError::RecursionTooDeep { .. } | DecodeError::UnsupportedSize => {
                ErrorCode::Limit
            }
            DecodeError::WrongSourceBehavior { .. } | DecodeError::Source(_) => ErrorCode::Io,
            _ => ErrorCode::Malformed,
        }
    }
}

/// Error while writing an object graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("unmarshallable {kind}")]
    Unmarshallable { kind: &'static str },

    #[error("object too deeply nested to marshal (depth {depth})")]
    NestedTooDeep { depth: usize },

    #[error("out of memory")]
    OutOfMemory,

    #[error("procedure records are not allowed")]
    CodeNotAllowed,

    #[error("unsupported format version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("too many shared objects")]
    TooManyReferences,

    #[error("{id:?} is not part of the graph")]
    DanglingObject { id: ObjectId },

    #[error("byte sink failed: {0}")]
    Sink(String),
}
