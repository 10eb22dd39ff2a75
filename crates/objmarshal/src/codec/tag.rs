//! Record tags.
//!
//! Every record starts with one tag byte. Bits 0-6 select the kind and bit 7
//! marks the record as referenceable.

/// Bit set on a tag whose object is added to the reference table.
pub const FLAG_REF: u8 = 0x80;

/// Kind selector in the low seven bits of a tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Unit = 0,
    False = 1,
    True = 2,
    /// Terminates the entries of a mapping.
    StopMark = 3,
    Ellipsis = 4,
    SmallInt = 5,
    BigInt = 6,
    FloatText = 7,
    FloatBinary = 8,
    ComplexText = 9,
    ComplexBinary = 10,
    Bytes = 11,
    TextUtf8 = 12,
    TextInterned = 13,
    TextAscii = 14,
    TextAsciiInterned = 15,
    TextAsciiShort = 16,
    TextAsciiShortInterned = 17,
    Tuple = 18,
    TupleSmall = 19,
    Sequence = 20,
    Mapping = 21,
    MutableSet = 22,
    ImmutableSet = 23,
    ProcedureRecord = 24,
    BackReference = 25,
    Slice = 26,
    /// Legacy 8-byte integer; read but never written.
    Int64 = 27,
}

impl Tag {
    /// Decodes the kind from the low seven bits of a tag byte.
    pub fn from_u8(byte: u8) -> Option<Tag> {
        let tag = match byte & !FLAG_REF {
            0 => Tag::Unit,
            1 => Tag::False,
            2 => Tag::True,
            3 => Tag::StopMark,
            4 => Tag::Ellipsis,
            5 => Tag::SmallInt,
            6 => Tag::BigInt,
            7 => Tag::FloatText,
            8 => Tag::FloatBinary,
            9 => Tag::ComplexText,
            10 => Tag::ComplexBinary,
            11 => Tag::Bytes,
            12 => Tag::TextUtf8,
            13 => Tag::TextInterned,
            14 => Tag::TextAscii,
            15 => Tag::TextAsciiInterned,
            16 => Tag::TextAsciiShort,
            17 => Tag::TextAsciiShortInterned,
            18 => Tag::Tuple,
            19 => Tag::TupleSmall,
            20 => Tag::Sequence,
            21 => Tag::Mapping,
            22 => Tag::MutableSet,
            23 => Tag::ImmutableSet,
            24 => Tag::ProcedureRecord,
            25 => Tag::BackReference,
            26 => Tag::Slice,
            27 => Tag::Int64,
            _ => return None,
        };
        Some(tag)
    }

    /// Returns the tag byte, with the reference flag when `flag` is set.
    #[inline]
    pub fn byte(self, flag: bool) -> u8 {
        if flag { self as u8 | FLAG_REF } else { self as u8 }
    }

    /// Returns a short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Unit => "unit",
            Tag::False => "false",
            Tag::True => "true",
            Tag::StopMark => "stop mark",
            Tag::Ellipsis => "ellipsis",
            Tag::SmallInt => "small int",
            Tag::BigInt => "big int",
            Tag::FloatText => "float (text)",
            Tag::FloatBinary => "float",
            Tag::ComplexText => "complex (text)",
            Tag::ComplexBinary => "complex",
            Tag::Bytes => "bytes",
            Tag::TextUtf8 => "text",
            Tag::TextInterned => "interned text",
            Tag::TextAscii => "ascii text",
            Tag::TextAsciiInterned => "interned ascii text",
            Tag::TextAsciiShort => "short ascii text",
            Tag::TextAsciiShortInterned => "interned short ascii text",
            Tag::Tuple => "tuple",
            Tag::TupleSmall => "small tuple",
            Tag::Sequence => "sequence",
            Tag::Mapping => "mapping",
            Tag::MutableSet => "set",
            Tag::ImmutableSet => "frozenset",
            Tag::ProcedureRecord => "procedure record",
            Tag::BackReference => "back-reference",
            Tag::Slice => "slice",
            Tag::Int64 => "int64",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_byte_roundtrip() {
        for byte in 0u8..=27 {
            let tag = Tag::from_u8(byte).unwrap();
            assert_eq!(tag.byte(false), byte);
            assert_eq!(tag.byte(true), byte | FLAG_REF);
            assert_eq!(Tag::from_u8(byte | FLAG_REF), Some(tag));
        }
    }

    #[test]
    fn test_names_are_distinct() {
        let mut names: Vec<&str> = (0u8..=27).filter_map(Tag::from_u8).map(Tag::name).collect();
        assert_eq!(names.len(), 28);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 28);
        assert_eq!(Tag::from_u8(24 | FLAG_REF).map(Tag::name), Some("procedure record"));
    }

    #[test]
    fn test_unknown_tags() {
        assert_eq!(Tag::from_u8(28), None);
        assert_eq!(Tag::from_u8(0x7F), None);
        assert_eq!(Tag::from_u8(0xFF), None);
    }
}
