use super::error::EncodingError;
use super::value::Value;
use crate::types::primitives::{decode_hex_array, HASH_SIZE, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte width of the `(offset, length)` descriptor stored for strings and
/// variable-length nested records.
pub const SEGMENT_POINTER_SIZE: usize = 8;

/// The closed set of primitive field kinds understood by the codec.
///
/// Integers are little-endian. `Hash`, `Digest` and `PublicKey` are opaque
/// byte strings written in their hex order. `String` occupies an 8-byte
/// `(offset: u32, length: u32)` pointer into a heap appended at the end of
/// the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Hash,
    Digest,
    PublicKey,
    Timespec,
    Bool,
    String,
}

impl Primitive {
    /// Fixed segment width in bytes.
    pub const fn size(self) -> usize {
        match self {
            Primitive::Int8 | Primitive::Uint8 | Primitive::Bool => 1,
            Primitive::Int16 | Primitive::Uint16 => 2,
            Primitive::Int32 | Primitive::Uint32 => 4,
            Primitive::Int64 | Primitive::Uint64 | Primitive::Timespec => 8,
            Primitive::Hash => HASH_SIZE,
            Primitive::PublicKey => PUBLIC_KEY_LENGTH,
            Primitive::Digest => SIGNATURE_LENGTH,
            Primitive::String => SEGMENT_POINTER_SIZE,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Int8 => "Int8",
            Primitive::Int16 => "Int16",
            Primitive::Int32 => "Int32",
            Primitive::Int64 => "Int64",
            Primitive::Uint8 => "Uint8",
            Primitive::Uint16 => "Uint16",
            Primitive::Uint32 => "Uint32",
            Primitive::Uint64 => "Uint64",
            Primitive::Hash => "Hash",
            Primitive::Digest => "Digest",
            Primitive::PublicKey => "PublicKey",
            Primitive::Timespec => "Timespec",
            Primitive::Bool => "Bool",
            Primitive::String => "String",
        }
    }

    fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64
        )
    }

    fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::Int8
                | Primitive::Int16
                | Primitive::Int32
                | Primitive::Int64
                | Primitive::Uint8
                | Primitive::Uint16
                | Primitive::Uint32
                | Primitive::Uint64
                | Primitive::Timespec
        )
    }

    /// Inclusive value range of an integer kind.
    fn integer_bounds(self) -> (i128, i128) {
        let bits = (self.size() * 8) as u32;
        if self.is_signed() {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    /// Write `value` into `buffer[from..to]`.
    ///
    /// The segment must already exist in the buffer. `String` additionally
    /// appends its UTF-8 bytes to the end of the buffer.
    pub fn encode(
        self,
        value: &Value,
        buffer: &mut Vec<u8>,
        from: usize,
        to: usize,
    ) -> Result<(), EncodingError> {
        self.check_segment(buffer.len(), from, to)?;

        match self {
            Primitive::Hash => write_hex::<HASH_SIZE>(self, value, &mut buffer[from..to]),
            Primitive::PublicKey => {
                write_hex::<PUBLIC_KEY_LENGTH>(self, value, &mut buffer[from..to])
            }
            Primitive::Digest => write_hex::<SIGNATURE_LENGTH>(self, value, &mut buffer[from..to]),
            Primitive::Bool => match value {
                Value::Bool(b) => {
                    buffer[from] = u8::from(*b);
                    Ok(())
                }
                other => Err(self.mismatch("a boolean", other)),
            },
            Primitive::String => match value {
                Value::Text(s) => {
                    let offset = to_u32(buffer.len())?;
                    let length = to_u32(s.len())?;
                    buffer[from..from + 4].copy_from_slice(&offset.to_le_bytes());
                    buffer[from + 4..to].copy_from_slice(&length.to_le_bytes());
                    buffer.extend_from_slice(s.as_bytes());
                    Ok(())
                }
                other => Err(self.mismatch("a string", other)),
            },
            _ => {
                let v = self.integer_value(value)?;
                let (min, max) = self.integer_bounds();
                if v < min || v > max {
                    return Err(EncodingError::OutOfRange {
                        kind: self.name(),
                        value: v.to_string(),
                    });
                }
                // Two's complement for negative signed values.
                let raw = if v < 0 {
                    (v + (1i128 << (self.size() * 8))) as u128
                } else {
                    v as u128
                };
                buffer[from..to].copy_from_slice(&raw.to_le_bytes()[..self.size()]);
                Ok(())
            }
        }
    }

    /// Read a value from `buffer[from..to]`.
    ///
    /// `String` follows its pointer, so `buffer` must be the whole message
    /// buffer the offsets were computed against.
    pub fn decode(self, buffer: &[u8], from: usize, to: usize) -> Result<Value, EncodingError> {
        self.check_segment(buffer.len(), from, to)?;
        let segment = &buffer[from..to];

        match self {
            Primitive::Hash | Primitive::PublicKey | Primitive::Digest => {
                Ok(Value::Text(hex::encode(segment)))
            }
            Primitive::Bool => match segment[0] {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                value => Err(EncodingError::InvalidBoolByte { value }),
            },
            Primitive::String => {
                let (offset, length) = read_pointer(segment);
                let bytes = read_heap(buffer, offset, length)?;
                let s = std::str::from_utf8(bytes).map_err(|e| EncodingError::InvalidUtf8 {
                    reason: e.to_string(),
                })?;
                Ok(Value::Text(s.to_string()))
            }
            _ => {
                let mut le = [0u8; 16];
                le[..segment.len()].copy_from_slice(segment);
                let raw = u128::from_le_bytes(le) as i128;
                let bits = (self.size() * 8) as u32;
                let v = if self.is_signed() && raw >= (1i128 << (bits - 1)) {
                    raw - (1i128 << bits)
                } else {
                    raw
                };
                Ok(Value::Integer(v))
            }
        }
    }

    fn check_segment(self, buffer_len: usize, from: usize, to: usize) -> Result<(), EncodingError> {
        if to < from || to - from != self.size() {
            return Err(EncodingError::SegmentLength {
                kind: self.name(),
                from,
                to,
                expected: self.size(),
            });
        }
        if to > buffer_len {
            return Err(EncodingError::SegmentOutOfBounds { to, buffer_len });
        }
        Ok(())
    }

    fn integer_value(self, value: &Value) -> Result<i128, EncodingError> {
        match value {
            Value::Integer(v) => Ok(*v),
            // 64-bit values may arrive as decimal strings from hosts without native u64.
            Value::Text(s) if self.is_integer() && self.size() == 8 => {
                s.parse::<i128>().map_err(|_| EncodingError::OutOfRange {
                    kind: self.name(),
                    value: s.clone(),
                })
            }
            other => Err(self.mismatch("an integer", other)),
        }
    }

    fn mismatch(self, expected: &'static str, got: &Value) -> EncodingError {
        EncodingError::TypeMismatch {
            kind: self.name(),
            expected,
            got: got.kind_name(),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn write_hex<const N: usize>(
    kind: Primitive,
    value: &Value,
    segment: &mut [u8],
) -> Result<(), EncodingError> {
    let s = match value {
        Value::Text(s) => s,
        other => return Err(kind.mismatch("a hex string", other)),
    };
    let bytes = decode_hex_array::<N>(s).map_err(|source| EncodingError::InvalidHex {
        kind: kind.name(),
        source,
    })?;
    segment.copy_from_slice(&bytes);
    Ok(())
}

pub(crate) fn to_u32(value: usize) -> Result<u32, EncodingError> {
    u32::try_from(value).map_err(|_| EncodingError::BufferOverflow { value })
}

/// Write a little-endian `u32` at `at`; the bytes must already exist.
pub(crate) fn write_u32(buffer: &mut [u8], at: usize, value: u32) {
    buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Split an 8-byte segment into its `(offset, length)` pair.
pub(crate) fn read_pointer(segment: &[u8]) -> (usize, usize) {
    let mut offset = [0u8; 4];
    let mut length = [0u8; 4];
    offset.copy_from_slice(&segment[..4]);
    length.copy_from_slice(&segment[4..8]);
    (
        u32::from_le_bytes(offset) as usize,
        u32::from_le_bytes(length) as usize,
    )
}

pub(crate) fn read_heap(buffer: &[u8], offset: usize, length: usize) -> Result<&[u8], EncodingError> {
    let end = offset
        .checked_add(length)
        .filter(|end| *end <= buffer.len())
        .ok_or(EncodingError::Truncated {
            offset,
            needed: length,
            buffer_len: buffer.len(),
        })?;
    Ok(&buffer[offset..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(kind: Primitive, value: impl Into<Value>) -> Result<Vec<u8>, EncodingError> {
        let mut buffer = vec![0u8; kind.size()];
        kind.encode(&value.into(), &mut buffer, 0, kind.size())?;
        Ok(buffer)
    }

    #[test]
    fn test_int32_minus_one() {
        assert_eq!(encode(Primitive::Int32, -1i32).unwrap(), vec![0xFF; 4]);
    }

    #[test]
    fn test_uint16_max() {
        assert_eq!(encode(Primitive::Uint16, 65535u16).unwrap(), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_little_endian_order() {
        assert_eq!(
            encode(Primitive::Uint32, 0x0102_0304u32).unwrap(),
            vec![0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(
            encode(Primitive::Int16, -2i16).unwrap(),
            vec![0xFE, 0xFF]
        );
    }

    #[test]
    fn test_zero_hash() {
        let zeros = "0".repeat(64);
        assert_eq!(encode(Primitive::Hash, zeros.as_str()).unwrap(), vec![0u8; 32]);
    }

    #[test]
    fn test_hash_keeps_byte_order() {
        let hex_str = format!("0102{}", "00".repeat(30));
        let bytes = encode(Primitive::Hash, hex_str.as_str()).unwrap();
        assert_eq!(&bytes[..3], &[0x01, 0x02, 0x00]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            encode(Primitive::Uint8, 256u16),
            Err(EncodingError::OutOfRange { kind: "Uint8", .. })
        ));
        assert!(matches!(
            encode(Primitive::Int8, -129i16),
            Err(EncodingError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode(Primitive::Uint32, -1i32),
            Err(EncodingError::OutOfRange { .. })
        ));
        assert!(encode(Primitive::Int8, -128i16).is_ok());
        assert!(encode(Primitive::Int8, 127i16).is_ok());
    }

    #[test]
    fn test_uint64_full_range_and_decimal_string() {
        assert_eq!(encode(Primitive::Uint64, u64::MAX).unwrap(), vec![0xFF; 8]);
        assert_eq!(
            encode(Primitive::Uint64, "18446744073709551615").unwrap(),
            vec![0xFF; 8]
        );
        assert!(matches!(
            encode(Primitive::Uint64, "18446744073709551616"),
            Err(EncodingError::OutOfRange { .. })
        ));
        assert_eq!(
            encode(Primitive::Int64, "-9223372036854775808").unwrap(),
            vec![0, 0, 0, 0, 0, 0, 0, 0x80]
        );
    }

    #[test]
    fn test_decimal_string_only_for_64_bit() {
        assert!(matches!(
            encode(Primitive::Uint32, "7"),
            Err(EncodingError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_segment_length() {
        let mut buffer = vec![0u8; 8];
        let result = Primitive::Uint32.encode(&Value::from(1u32), &mut buffer, 0, 8);
        assert!(matches!(
            result,
            Err(EncodingError::SegmentLength { expected: 4, .. })
        ));
    }

    #[test]
    fn test_segment_past_buffer_end() {
        let mut buffer = vec![0u8; 2];
        let result = Primitive::Uint32.encode(&Value::from(1u32), &mut buffer, 0, 4);
        assert!(matches!(
            result,
            Err(EncodingError::SegmentOutOfBounds { to: 4, buffer_len: 2 })
        ));
    }

    #[test]
    fn test_malformed_hex_rejected() {
        assert!(matches!(
            encode(Primitive::Hash, "abcd"),
            Err(EncodingError::InvalidHex { kind: "Hash", .. })
        ));
        assert!(matches!(
            encode(Primitive::Digest, "00".repeat(32)),
            Err(EncodingError::InvalidHex { kind: "Digest", .. })
        ));
    }

    #[test]
    fn test_bool() {
        assert_eq!(encode(Primitive::Bool, true).unwrap(), vec![1]);
        assert_eq!(encode(Primitive::Bool, false).unwrap(), vec![0]);
        assert!(matches!(
            encode(Primitive::Bool, 1u8),
            Err(EncodingError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Primitive::Bool.decode(&[2], 0, 1),
            Err(EncodingError::InvalidBoolByte { value: 2 })
        ));
    }

    #[test]
    fn test_string_appends_to_heap() {
        let mut buffer = vec![0u8; 12];
        Primitive::String
            .encode(&Value::from("héllo"), &mut buffer, 4, 12)
            .unwrap();
        // offset = 12 (buffer length before append), length = 6 UTF-8 bytes
        assert_eq!(&buffer[4..8], &12u32.to_le_bytes());
        assert_eq!(&buffer[8..12], &6u32.to_le_bytes());
        assert_eq!(&buffer[12..], "héllo".as_bytes());
        assert_eq!(
            Primitive::String.decode(&buffer, 4, 12).unwrap(),
            Value::from("héllo")
        );
    }

    #[test]
    fn test_string_pointer_past_end_rejected() {
        let mut buffer = vec![0u8; 8];
        buffer[..4].copy_from_slice(&4u32.to_le_bytes());
        buffer[4..].copy_from_slice(&10u32.to_le_bytes());
        assert!(matches!(
            Primitive::String.decode(&buffer, 0, 8),
            Err(EncodingError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_signed() {
        assert_eq!(
            Primitive::Int32.decode(&[0xFF; 4], 0, 4).unwrap(),
            Value::Integer(-1)
        );
        assert_eq!(
            Primitive::Uint32.decode(&[0xFF; 4], 0, 4).unwrap(),
            Value::Integer(u32::MAX as i128)
        );
        assert_eq!(
            Primitive::Int64.decode(&[0, 0, 0, 0, 0, 0, 0, 0x80], 0, 8).unwrap(),
            Value::Integer(i64::MIN as i128)
        );
    }
}
