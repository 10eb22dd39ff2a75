//! Text and byte-string records.
//!
//! Text has three layouts: short ASCII (one-byte length), ASCII (4-byte
//! length) and UTF-8 (4-byte length). Each has an interned variant.

use crate::codec::decoder::Decoder;
use crate::codec::encoder::Encoder;
use crate::codec::tag::Tag;
use crate::error::{DecodeError, EncodeError};
use crate::limits::SHORT_TEXT_LEN;
use crate::model::{ObjectId, Text, Value};

// =============================================================================
// ENCODING
// =============================================================================

impl Encoder<'_> {
    pub(crate) fn write_text(&mut self, text: &Text, flag: bool) -> Result<(), EncodeError> {
        let bytes = text.value.as_bytes();
        let interned = text.interned && self.format.has_interned_text();

        if self.format.has_compact_forms() && text.is_ascii() {
            if bytes.len() < SHORT_TEXT_LEN {
                let tag = if interned { Tag::TextAsciiShortInterned } else { Tag::TextAsciiShort };
                self.out.write_byte(tag.byte(flag));
                self.out.write_short_prefixed(bytes);
            } else {
                let tag = if interned { Tag::TextAsciiInterned } else { Tag::TextAscii };
                self.out.write_byte(tag.byte(flag));
                self.out.write_bytes_prefixed(bytes)?;
            }
            return Ok(());
        }

        let tag = if interned { Tag::TextInterned } else { Tag::TextUtf8 };
        self.out.write_byte(tag.byte(flag));
        self.out.write_bytes_prefixed(bytes)
    }
}

// =============================================================================
// DECODING
// =============================================================================

impl Decoder<'_, '_> {
    pub(crate) fn read_bytes(&mut self, flag: bool) -> Result<ObjectId, DecodeError> {
        let len = self.input.read_size("bytes")?;
        let data = self.input.read_vec(len, "bytes")?;
        self.finish(Value::Bytes(data), flag)
    }

    pub(crate) fn read_text(&mut self, tag: Tag, flag: bool) -> Result<ObjectId, DecodeError> {
        let (short, ascii, interned) = match tag {
            Tag::TextAsciiShort => (true, true, false),
            Tag::TextAsciiShortInterned => (true, true, true),
            Tag::TextAscii => (false, true, false),
            Tag::TextAsciiInterned => (false, true, true),
            Tag::TextInterned => (false, false, true),
            _ => (false, false, false),
        };

        let len = if short {
            self.input.read_byte("text length")? as usize
        } else {
            self.input.read_size("text")?
        };
        let raw = self.input.read_vec(len, "text")?;
        if ascii && !raw.is_ascii() {
            return Err(DecodeError::InvalidUtf8 { field: "ascii text" });
        }
        let value = String::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8 { field: "text" })?;

        let text = if interned { Text::interned(value) } else { Text::new(value) };
        self.finish(Value::Text(text), flag)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{FormatDescriptor, decode_from_slice, encode_to_vec};
    use crate::error::DecodeError;
    use crate::model::{Graph, Value};

    fn encode_at(graph: &Graph, root: crate::model::ObjectId, version: u8) -> Vec<u8> {
        encode_to_vec(graph, root, FormatDescriptor::new(version).unwrap()).unwrap()
    }

    #[test]
    fn test_short_ascii_form() {
        let mut graph = Graph::new();
        let id = graph.text("hi");
        assert_eq!(encode_at(&graph, id, 4), vec![16, 2, b'h', b'i']);
        // Older versions use the UTF-8 form.
        assert_eq!(encode_at(&graph, id, 3), vec![12, 2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn test_long_ascii_form() {
        let mut graph = Graph::new();
        let id = graph.text("x".repeat(300));
        let bytes = encode_at(&graph, id, 5);
        assert_eq!(&bytes[..5], &[14, 0x2C, 0x01, 0, 0]);
        assert_eq!(bytes.len(), 5 + 300);
    }

    #[test]
    fn test_non_ascii_uses_utf8() {
        let mut graph = Graph::new();
        let id = graph.text("é");
        assert_eq!(encode_at(&graph, id, 5), vec![12, 2, 0, 0, 0, 0xC3, 0xA9]);
    }

    #[test]
    fn test_interned_forms() {
        let mut graph = Graph::new();
        let id = graph.intern("name");
        // Interned text is always referenceable from version 3.
        assert_eq!(encode_at(&graph, id, 5)[0], 17 | 0x80);
        assert_eq!(encode_at(&graph, id, 3)[0], 13 | 0x80);
        assert_eq!(encode_at(&graph, id, 1)[0], 13);
        assert_eq!(encode_at(&graph, id, 0)[0], 12);
    }

    #[test]
    fn test_interned_text_is_canonical_after_decode() {
        let mut graph = Graph::new();
        let a = graph.intern("key");
        let root = graph.tuple(vec![a, a]);

        // Version 2 repeats the text; the reader still yields one object.
        let bytes = encode_at(&graph, root, 2);
        let decoded = decode_from_slice(&bytes, false).unwrap();
        let Some(Value::Tuple(items)) = decoded.graph.get(decoded.root) else {
            panic!("expected a tuple");
        };
        assert_eq!(items[0], items[1]);
    }

    #[test]
    fn test_non_ascii_in_ascii_form_rejected() {
        let bytes = [16, 1, 0xC3];
        assert_eq!(
            decode_from_slice(&bytes, false).unwrap_err(),
            DecodeError::InvalidUtf8 { field: "ascii text" }
        );
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let bytes = [12, 1, 0, 0, 0, 0xFF];
        assert_eq!(
            decode_from_slice(&bytes, false).unwrap_err(),
            DecodeError::InvalidUtf8 { field: "text" }
        );
    }
}
