//! Byte sinks, byte sources and fixed-width primitives.
//!
//! All multi-byte integers are little-endian. Sizes are 4-byte signed
//! integers; negative sizes are malformed.

use std::io::{ErrorKind, Read};

use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_PREALLOC, MAX_SIZE, READ_CHUNK};

// =============================================================================
// SOURCES
// =============================================================================

/// A sequential source of bytes.
///
/// `read_into` must fill `buf` completely unless the input ends first, and
/// return the number of bytes it provided. Returning more than `buf.len()`
/// breaks the contract and fails the read.
pub trait ByteSource {
    fn read_into(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// In-memory byte source.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Creates a source over a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_into(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Byte source over any [`std::io::Read`].
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
}

impl<R: Read> IoSource<R> {
    /// Wraps a reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

// =============================================================================
// SINKS
// =============================================================================

/// A sequential sink for bytes.
pub trait ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

impl<W: std::io::Write + ?Sized> ByteSink for W {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.write_all(bytes)
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding primitives from a [`ByteSource`].
///
/// Enforces the source contract and counts consumed bytes.
pub struct Reader<'s> {
    source: &'s mut dyn ByteSource,
    consumed: usize,
}

impl<'s> Reader<'s> {
    /// Creates a reader over a byte source.
    pub fn new(source: &'s mut dyn ByteSource) -> Self {
        Self { source, consumed: 0 }
    }

    /// Returns the number of bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Fills `buf` exactly.
    pub fn read_exact(&mut self, buf: &mut [u8], context: &'static str) -> Result<(), DecodeError> {
        let requested = buf.len();
        let returned = self
            .source
            .read_into(buf)
            .map_err(|e| DecodeError::Source(e.to_string()))?;
        if returned > requested {
            return Err(DecodeError::WrongSourceBehavior { requested, returned });
        }
        self.consumed += returned;
        if returned < requested {
            return Err(DecodeError::UnexpectedEof { context });
        }
        Ok(())
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf, context)?;
        Ok(buf[0])
    }

    /// Reads a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf, context)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Reads a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, context)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Reads a little-endian i64.
    pub fn read_i64(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf, context)?;
        Ok(i64::from_le_bytes(buf))
    }

    /// Reads a little-endian f64, NaN payloads included.
    #[inline]
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf, context)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads a 4-byte size, rejecting negative values.
    pub fn read_size(&mut self, context: &'static str) -> Result<usize, DecodeError> {
        let size = self.read_i32(context)?;
        usize::try_from(size).map_err(|_| DecodeError::MalformedSize {
            context,
            size: i64::from(size),
        })
    }

    /// Reads `len` bytes into a new vector.
    ///
    /// Memory grows with the data actually received, so a declared length
    /// that the source cannot back fails with `UnexpectedEof` after at most
    /// one chunk of over-allocation.
    pub fn read_vec(&mut self, len: usize, context: &'static str) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::with_capacity(len.min(READ_CHUNK));
        while out.len() < len {
            let start = out.len();
            let step = (len - start).min(READ_CHUNK);
            out.resize(start + step, 0);
            self.read_exact(&mut out[start..], context)?;
        }
        Ok(out)
    }
}

/// Capacity to pre-allocate for an untrusted element count.
pub fn prealloc(count: usize) -> usize {
    count.min(MAX_PREALLOC)
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data into a buffer.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a little-endian u16.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian i32.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian f64.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 4-byte size.
    pub fn write_size(&mut self, size: usize) -> Result<(), EncodeError> {
        if size > MAX_SIZE {
            return Err(EncodeError::Unmarshallable {
                kind: "object larger than the 4-byte size field",
            });
        }
        self.write_i32(size as i32);
        Ok(())
    }

    /// Writes a size-prefixed byte array.
    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_size(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a one-byte length followed by the bytes.
    ///
    /// The caller guarantees `bytes.len() <= 255`.
    pub fn write_short_prefixed(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= u8::MAX as usize);
        self.buf.push(bytes.len() as u8);
        self.buf.extend_from_slice(bytes);
    }
}

// =============================================================================
// STANDALONE HELPERS
// =============================================================================

/// Writes a 4-byte little-endian integer, e.g. for a container header.
pub fn write_long(value: i32, sink: &mut dyn ByteSink) -> Result<(), EncodeError> {
    sink.write_bytes(&value.to_le_bytes())
        .map_err(|e| EncodeError::Sink(e.to_string()))
}

/// Reads a 4-byte little-endian signed integer.
pub fn read_long(source: &mut dyn ByteSource) -> Result<i32, DecodeError> {
    Reader::new(source).read_i32("long")
}

/// Reads a 2-byte little-endian signed integer.
pub fn read_short(source: &mut dyn ByteSource) -> Result<i16, DecodeError> {
    let raw = Reader::new(source).read_u16("short")?;
    Ok(raw as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A source that claims to return more bytes than requested.
    struct Liar;

    impl ByteSource for Liar {
        fn read_into(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(buf.len() + 1)
        }
    }

    /// A source that hands out one byte per `read` call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_fixed_width_roundtrip() {
        let mut writer = Writer::new();
        writer.write_byte(0xAB);
        writer.write_u16(0x7FFF);
        writer.write_i32(-2);
        writer.write_f64(3.5);

        let bytes = writer.into_bytes();
        let mut source = SliceSource::new(&bytes);
        let mut reader = Reader::new(&mut source);
        assert_eq!(reader.read_byte("test").unwrap(), 0xAB);
        assert_eq!(reader.read_u16("test").unwrap(), 0x7FFF);
        assert_eq!(reader.read_i32("test").unwrap(), -2);
        assert_eq!(reader.read_f64("test").unwrap(), 3.5);
        assert_eq!(reader.consumed(), 15);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut writer = Writer::new();
        writer.write_i32(0x0102_0304);
        assert_eq!(writer.as_bytes(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_negative_size_rejected() {
        let bytes = (-1i32).to_le_bytes();
        let mut source = SliceSource::new(&bytes);
        let mut reader = Reader::new(&mut source);
        assert_eq!(
            reader.read_size("list"),
            Err(DecodeError::MalformedSize { context: "list", size: -1 })
        );
    }

    #[test]
    fn test_unexpected_eof() {
        let data = [0u8; 5];
        let mut source = SliceSource::new(&data);
        let mut reader = Reader::new(&mut source);
        let result = reader.read_vec(10, "test");
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_wrong_source_behavior() {
        let mut source = Liar;
        let mut reader = Reader::new(&mut source);
        assert_eq!(
            reader.read_i32("test"),
            Err(DecodeError::WrongSourceBehavior { requested: 4, returned: 5 })
        );
    }

    #[test]
    fn test_io_source_fills_across_short_reads() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut source = IoSource::new(Trickle(&data));
        let mut reader = Reader::new(&mut source);
        assert_eq!(reader.read_vec(6, "test").unwrap(), data.to_vec());
        assert!(matches!(
            reader.read_byte("test"),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_read_vec_large_claim_is_bounded() {
        // Claims far more than is available; must fail without allocating it all.
        let data = vec![7u8; 100];
        let mut source = SliceSource::new(&data);
        let mut reader = Reader::new(&mut source);
        let result = reader.read_vec(1 << 30, "bytes");
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { context: "bytes" })));
    }

    #[test]
    fn test_long_helpers() {
        let mut sink = Vec::new();
        write_long(-7, &mut sink).unwrap();
        assert_eq!(sink, vec![0xF9, 0xFF, 0xFF, 0xFF]);

        let mut source = SliceSource::new(&sink);
        assert_eq!(read_long(&mut source).unwrap(), -7);

        let bytes = [0xFE, 0xFF];
        let mut source = SliceSource::new(&bytes);
        assert_eq!(read_short(&mut source).unwrap(), -2);
    }

    #[test]
    fn test_oversized_write_rejected() {
        let mut writer = Writer::new();
        assert!(matches!(
            writer.write_size(MAX_SIZE + 1),
            Err(EncodeError::Unmarshallable { .. })
        ));
    }
}
