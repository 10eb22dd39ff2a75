//! Binary encoding and decoding of object graphs.
//!
//! Each record is a tag byte followed by a kind-specific payload. The
//! format version is chosen by the caller and is not part of the stream.

mod container;
pub mod decoder;
pub mod encoder;
pub mod format;
pub mod integer;
pub mod primitives;
mod procedure;
pub mod refs;
pub mod tag;
mod text;

pub use decoder::{Decoded, decode, decode_from_slice, decode_from_slice_partial, decode_into};
pub use encoder::{encode, encode_to_vec, encode_with, fingerprint};
pub use format::FormatDescriptor;
pub use primitives::{
    ByteSink, ByteSource, IoSource, Reader, SliceSource, Writer, read_long, read_short, write_long,
};
pub use tag::{FLAG_REF, Tag};
