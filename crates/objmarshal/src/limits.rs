//! Format versions and decoding limits.
//!
//! The limits are policy, not protocol: the writer and the reader enforce the
//! same values so anything one side produces the other side accepts.

/// Newest format version this crate writes.
pub const CURRENT_VERSION: u8 = 5;

/// First version that emits the referenceable flag and back-references.
pub const MIN_REF_VERSION: u8 = 3;

/// First version that emits the interned UTF-8 text form.
pub const MIN_INTERNED_VERSION: u8 = 1;

/// First version that emits binary floats. Older output uses decimal text.
pub const MIN_BINARY_FLOAT_VERSION: u8 = 1;

/// First version that emits the ASCII text forms and the small tuple form.
pub const MIN_COMPACT_VERSION: u8 = 4;

/// First version that can represent slices.
pub const MIN_SLICE_VERSION: u8 = 5;

/// Maximum nesting depth, counted from the root (depth 1).
///
/// Low enough that the recursive reader and writer fit a 2 MiB thread stack
/// in unoptimized builds.
pub const MAX_DEPTH: usize = 200;

/// Maximum declared count or length (the 4-byte size field).
pub const MAX_SIZE: usize = 0x7FFF_FFFF;

/// Maximum number of entries in the reader's reference table.
pub const MAX_REFS: usize = 0x7FFF_FFFE;

/// Maximum number of slots pre-allocated from an untrusted count.
pub const MAX_PREALLOC: usize = 4096;

/// Byte payloads are pulled from the source in chunks of this size.
pub const READ_CHUNK: usize = 64 * 1024;

/// Maximum length of a legacy decimal float (one-byte length prefix).
pub const MAX_FLOAT_TEXT_LEN: usize = 255;

/// Texts shorter than this use the one-byte length ASCII form.
pub const SHORT_TEXT_LEN: usize = 256;

/// Tuples shorter than this use the one-byte count form.
pub const SMALL_TUPLE_LEN: usize = 256;
