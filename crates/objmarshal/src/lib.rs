//! objmarshal: versioned binary serialization for object graphs.
//!
//! This crate encodes graphs of runtime values (scalars, text, bytes,
//! tuples, sequences, mappings, sets, slices and compiled procedure records)
//! into a compact tagged format, and decodes them back into an identical
//! graph, shared and cyclic references included.
//!
//! # Overview
//!
//! - **Versioned**: format versions 0 through 5 are written on request and
//!   every record form is accepted on read
//! - **Identity-preserving**: from version 3, an object reachable along
//!   several paths is written once and repeated as a back-reference
//! - **Deterministic**: set elements are ordered by their own encodings, so
//!   equal content always yields equal bytes
//!
//! # Quick Start
//!
//! ```rust
//! use objmarshal::{BigInt, Graph, decode_from_slice, encode};
//!
//! let mut graph = Graph::new();
//! let name = graph.intern("id");
//! let big = graph.bigint(BigInt::from(10u8).pow(30));
//! let list = graph.list(vec![name, big]);
//! graph.push_item(list, list);
//!
//! let mut bytes = Vec::new();
//! encode(&graph, list, 4, false, &mut bytes).unwrap();
//!
//! let decoded = decode_from_slice(&bytes, false).unwrap();
//! assert!(graph.deep_eq(list, &decoded.graph, decoded.root));
//! ```
//!
//! # Modules
//!
//! - [`model`]: The value graph (arena, values, procedure records)
//! - [`codec`]: Encoding and decoding
//! - [`error`]: Error types
//! - [`limits`]: Versions and decoding limits
//!
//! # Security
//!
//! The decoder is designed to handle untrusted input:
//! - Nesting depth is bounded on both sides
//! - Declared sizes never pre-allocate more than a fixed number of slots
//! - Procedure records are refused unless the caller allows code
//! - A failed decode leaves the target graph as it was

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;

pub use codec::{
    ByteSink, ByteSource, Decoded, FormatDescriptor, IoSource, SliceSource, decode,
    decode_from_slice, decode_from_slice_partial, decode_into, encode, encode_to_vec, encode_with,
    fingerprint, read_long, read_short, write_long,
};
pub use error::{DecodeError, EncodeError, ErrorCode};
pub use model::{Graph, InterningTable, ObjectId, ProcedureBuilder, ProcedureRecord, Text, Value};
pub use num_bigint::BigInt;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
