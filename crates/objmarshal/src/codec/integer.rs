//! Integer and float records.
//!
//! Integers that fit 32 bits are written as a 4-byte payload. Larger ones
//! use a signed digit count followed by base-2^15 digits, least significant
//! first, which keeps the format independent of any machine word size.
//!
//! Floats are 8 raw bytes, except at version 0 where they are decimal text
//! with a one-byte length.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};

use crate::codec::decoder::Decoder;
use crate::codec::encoder::Encoder;
use crate::codec::primitives::{Reader, Writer, prealloc};
use crate::codec::tag::Tag;
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_FLOAT_TEXT_LEN, MAX_SIZE};
use crate::model::{ObjectId, Value};

/// Bits per wire digit.
pub const DIGIT_BITS: u32 = 15;

/// Exclusive upper bound of a wire digit.
pub const DIGIT_BASE: u16 = 1 << DIGIT_BITS;

const DIGIT_MASK: u64 = (1 << DIGIT_BITS) - 1;

// =============================================================================
// DIGITS
// =============================================================================

/// Splits a magnitude into base-2^15 digits, least significant first.
///
/// The most significant digit is never zero; zero has no digits.
pub fn to_digits(magnitude: &BigUint) -> Vec<u16> {
    let words = magnitude.to_u64_digits();
    let count = magnitude.bits().div_ceil(u64::from(DIGIT_BITS)) as usize;
    let mut digits = Vec::with_capacity(count);
    for i in 0..count {
        let offset = i * DIGIT_BITS as usize;
        let word = offset / 64;
        let shift = offset % 64;
        let mut chunk = words[word] >> shift;
        if shift > 64 - DIGIT_BITS as usize && word + 1 < words.len() {
            chunk |= words[word + 1] << (64 - shift);
        }
        digits.push((chunk & DIGIT_MASK) as u16);
    }
    digits
}

/// Rebuilds a magnitude from base-2^15 digits, least significant first.
pub fn from_digits(digits: &[u16]) -> BigUint {
    let bits = digits.len() * DIGIT_BITS as usize;
    let mut words = vec![0u32; bits.div_ceil(32)];
    for (i, &digit) in digits.iter().enumerate() {
        let offset = i * DIGIT_BITS as usize;
        let word = offset / 32;
        let shift = offset % 32;
        let digit = u32::from(digit);
        words[word] |= digit << shift;
        if shift > 32 - DIGIT_BITS as usize {
            words[word + 1] |= digit >> (32 - shift);
        }
    }
    BigUint::new(words)
}

// =============================================================================
// ENCODING
// =============================================================================

impl Encoder<'_> {
    pub(crate) fn write_int(&mut self, value: i64, flag: bool) {
        match i32::try_from(value) {
            Ok(small) => {
                self.out.write_byte(Tag::SmallInt.byte(flag));
                self.out.write_i32(small);
            }
            Err(_) => {
                // Every i64 fits in five digits, far below the size limit.
                let digits = to_digits(&BigUint::from(value.unsigned_abs()));
                self.out.write_byte(Tag::BigInt.byte(flag));
                write_digits(&mut self.out, value < 0, &digits);
            }
        }
    }

    pub(crate) fn write_bigint(&mut self, value: &BigInt, flag: bool) -> Result<(), EncodeError> {
        if let Some(small) = value.to_i32() {
            self.out.write_byte(Tag::SmallInt.byte(flag));
            self.out.write_i32(small);
            return Ok(());
        }
        let digits = to_digits(value.magnitude());
        if digits.len() > MAX_SIZE {
            return Err(EncodeError::Unmarshallable {
                kind: "integer too large",
            });
        }
        self.out.write_byte(Tag::BigInt.byte(flag));
        write_digits(&mut self.out, value.sign() == Sign::Minus, &digits);
        Ok(())
    }

    pub(crate) fn write_float(&mut self, value: f64, flag: bool) -> Result<(), EncodeError> {
        if self.format.has_binary_floats() {
            self.out.write_byte(Tag::FloatBinary.byte(flag));
            self.out.write_f64(value);
        } else {
            self.out.write_byte(Tag::FloatText.byte(flag));
            write_float_text(&mut self.out, value)?;
        }
        Ok(())
    }

    pub(crate) fn write_complex(
        &mut self,
        real: f64,
        imag: f64,
        flag: bool,
    ) -> Result<(), EncodeError> {
        if self.format.has_binary_floats() {
            self.out.write_byte(Tag::ComplexBinary.byte(flag));
            self.out.write_f64(real);
            self.out.write_f64(imag);
        } else {
            self.out.write_byte(Tag::ComplexText.byte(flag));
            write_float_text(&mut self.out, real)?;
            write_float_text(&mut self.out, imag)?;
        }
        Ok(())
    }
}

fn write_digits(out: &mut Writer, negative: bool, digits: &[u16]) {
    let count = digits.len() as i32;
    out.write_i32(if negative { -count } else { count });
    for &digit in digits {
        out.write_u16(digit);
    }
}

fn write_float_text(out: &mut Writer, value: f64) -> Result<(), EncodeError> {
    let text = format!("{value:e}");
    if text.len() > MAX_FLOAT_TEXT_LEN {
        return Err(EncodeError::Unmarshallable {
            kind: "float text too long",
        });
    }
    out.write_short_prefixed(text.as_bytes());
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

impl Decoder<'_, '_> {
    pub(crate) fn read_small_int(&mut self, flag: bool) -> Result<ObjectId, DecodeError> {
        let value = self.input.read_i32("small int")?;
        self.finish(Value::Int(i64::from(value)), flag)
    }

    pub(crate) fn read_int64(&mut self, flag: bool) -> Result<ObjectId, DecodeError> {
        let value = self.input.read_i64("int64")?;
        self.finish(Value::Int(value), flag)
    }

    pub(crate) fn read_bigint(&mut self, flag: bool) -> Result<ObjectId, DecodeError> {
        let value = read_bigint_payload(&mut self.input)?;
        self.finish(Value::integer(value), flag)
    }

    pub(crate) fn read_float(&mut self, binary: bool, flag: bool) -> Result<ObjectId, DecodeError> {
        let value = read_float_payload(&mut self.input, binary)?;
        self.finish(Value::Float(value), flag)
    }

    pub(crate) fn read_complex(
        &mut self,
        binary: bool,
        flag: bool,
    ) -> Result<ObjectId, DecodeError> {
        let real = read_float_payload(&mut self.input, binary)?;
        let imag = read_float_payload(&mut self.input, binary)?;
        self.finish(Value::Complex { real, imag }, flag)
    }
}

fn read_bigint_payload(input: &mut Reader<'_>) -> Result<BigInt, DecodeError> {
    let signed_count = input.read_i32("big int size")?;
    if signed_count == i32::MIN {
        return Err(DecodeError::MalformedSize {
            context: "big int",
            size: i64::from(signed_count),
        });
    }
    let count = signed_count.unsigned_abs() as usize;
    if count == 0 {
        return Ok(BigInt::zero());
    }

    let mut digits = Vec::with_capacity(prealloc(count));
    for _ in 0..count {
        let digit = input.read_u16("big int digit")?;
        if digit >= DIGIT_BASE {
            return Err(DecodeError::MalformedInteger {
                reason: "digit out of range",
            });
        }
        digits.push(digit);
    }
    if digits.last() == Some(&0) {
        return Err(DecodeError::MalformedInteger {
            reason: "unnormalized",
        });
    }

    let sign = if signed_count < 0 { Sign::Minus } else { Sign::Plus };
    Ok(BigInt::from_biguint(sign, from_digits(&digits)))
}

fn read_float_payload(input: &mut Reader<'_>, binary: bool) -> Result<f64, DecodeError> {
    if binary {
        return input.read_f64("float");
    }
    let len = input.read_byte("float text length")? as usize;
    let raw = input.read_vec(len, "float text")?;
    let text = std::str::from_utf8(&raw).map_err(|_| DecodeError::MalformedFloat)?;
    text.parse::<f64>().map_err(|_| DecodeError::MalformedFloat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitives::SliceSource;
    use proptest::prelude::*;

    fn read_payload(bytes: &[u8]) -> Result<BigInt, DecodeError> {
        let mut source = SliceSource::new(bytes);
        let mut reader = Reader::new(&mut source);
        read_bigint_payload(&mut reader)
    }

    #[test]
    fn test_digits_of_known_values() {
        assert!(to_digits(&BigUint::zero()).is_empty());
        assert_eq!(to_digits(&BigUint::from(0x7FFFu32)), vec![0x7FFF]);
        assert_eq!(to_digits(&BigUint::from(0x8000u32)), vec![0, 1]);
        // 2^64 straddles the first word boundary.
        let big = BigUint::from(1u8) << 64u32;
        assert_eq!(to_digits(&big), vec![0, 0, 0, 0, 16]);
    }

    #[test]
    fn test_ten_to_thirty() {
        let value = BigUint::from(10u8).pow(30);
        let digits = to_digits(&value);
        assert_eq!(digits.len(), 7);
        assert!(digits.iter().all(|&d| d < DIGIT_BASE));
        assert_eq!(from_digits(&digits), value);
    }

    #[test]
    fn test_negative_payload() {
        // -(2^15 + 5) = digits [5, 1], count -2
        let bytes = [0xFE, 0xFF, 0xFF, 0xFF, 5, 0, 1, 0];
        assert_eq!(read_payload(&bytes).unwrap(), BigInt::from(-(32768 + 5)));
    }

    #[test]
    fn test_zero_count_is_zero() {
        assert_eq!(read_payload(&[0, 0, 0, 0]).unwrap(), BigInt::zero());
    }

    #[test]
    fn test_unnormalized_rejected() {
        let bytes = [2, 0, 0, 0, 1, 0, 0, 0];
        assert_eq!(
            read_payload(&bytes),
            Err(DecodeError::MalformedInteger { reason: "unnormalized" })
        );
    }

    #[test]
    fn test_digit_out_of_range_rejected() {
        let bytes = [1, 0, 0, 0, 0x00, 0x80];
        assert_eq!(
            read_payload(&bytes),
            Err(DecodeError::MalformedInteger { reason: "digit out of range" })
        );
    }

    #[test]
    fn test_min_count_rejected() {
        let bytes = i32::MIN.to_le_bytes();
        assert!(matches!(
            read_payload(&bytes),
            Err(DecodeError::MalformedSize { context: "big int", .. })
        ));
    }

    #[test]
    fn test_float_text_roundtrip() {
        for value in [0.0, -1.5, 1e300, 5e-324, 0.1, f64::INFINITY, f64::NEG_INFINITY] {
            let mut out = Writer::new();
            write_float_text(&mut out, value).unwrap();
            let bytes = out.into_bytes();
            let mut source = SliceSource::new(&bytes);
            let mut reader = Reader::new(&mut source);
            let back = read_float_payload(&mut reader, false).unwrap();
            assert_eq!(back.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_float_text_garbage() {
        let bytes = [3, b'1', b'x', b'2'];
        let mut source = SliceSource::new(&bytes);
        let mut reader = Reader::new(&mut source);
        assert_eq!(read_float_payload(&mut reader, false), Err(DecodeError::MalformedFloat));
    }

    proptest! {
        #[test]
        fn test_digits_roundtrip(words in prop::collection::vec(any::<u32>(), 0..12)) {
            let value = BigUint::new(words);
            let digits = to_digits(&value);
            prop_assert!(digits.last().is_none_or(|&d| d != 0));
            prop_assert_eq!(from_digits(&digits), value);
        }
    }
}
