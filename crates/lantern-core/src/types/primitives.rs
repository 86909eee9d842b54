use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of bytes in a SHA-256 digest.
pub const HASH_SIZE: usize = 32;

/// Number of bytes in an Ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Number of bytes in an Ed25519 secret key (seed followed by the public key).
pub const SECRET_KEY_LENGTH: usize = 64;

/// Number of bytes in an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Errors raised while parsing hex-encoded hashes, keys and signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("Expected {expected} hex characters, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid hex string: {reason}")]
    InvalidCharacter { reason: String },
}

/// Decode a hex string of exactly `2 * N` characters into a byte array.
///
/// Bytes come out in the order they appear in the string; these values are
/// opaque digests, never integers, so no endianness conversion happens.
pub fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    if s.len() != N * 2 {
        return Err(HexError::InvalidLength {
            expected: N * 2,
            got: s.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).map_err(|e| HexError::InvalidCharacter {
        reason: e.to_string(),
    })?;
    Ok(out)
}

macro_rules! hex_bytes_type {
    ($(#[$attr:meta])* $name:ident, $len:expr) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LENGTH: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, HexError> {
                if bytes.len() != $len {
                    return Err(HexError::InvalidLength {
                        expected: $len * 2,
                        got: bytes.len() * 2,
                    });
                }
                let mut arr = [0u8; $len];
                arr.copy_from_slice(bytes);
                Ok(Self(arr))
            }

            pub fn from_hex(s: &str) -> Result<Self, HexError> {
                decode_hex_array::<$len>(s).map(Self)
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = HexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes_type!(
    /// A SHA-256 digest: tree nodes, record hashes, block hashes.
    Hash,
    HASH_SIZE
);

hex_bytes_type!(
    /// An Ed25519 public key of a validator or message author.
    PublicKey,
    PUBLIC_KEY_LENGTH
);

hex_bytes_type!(
    /// A detached Ed25519 signature.
    Signature,
    SIGNATURE_LENGTH
);

impl Hash {
    /// The all-zero hash: root of an empty list or an empty map.
    pub const fn zero() -> Self {
        Self([0u8; HASH_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_from_hex_roundtrip() {
        let hex_str = "aa".repeat(32);
        let hash = Hash::from_hex(&hex_str).unwrap();
        assert_eq!(hash.0, [0xAA; 32]);
        assert_eq!(hash.to_hex(), hex_str);
    }

    #[test]
    fn test_upper_case_hex_accepted() {
        let hash = Hash::from_hex(&"AB".repeat(32)).unwrap();
        assert_eq!(hash.0, [0xAB; 32]);
        assert_eq!(hash.to_string(), "ab".repeat(32));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(
            Hash::from_hex("aabb"),
            Err(HexError::InvalidLength {
                expected: 64,
                got: 4
            })
        );
        assert!(matches!(
            Signature::from_hex(&"00".repeat(32)),
            Err(HexError::InvalidLength { expected: 128, .. })
        ));
    }

    #[test]
    fn test_non_hex_rejected() {
        let bad = format!("zz{}", "00".repeat(31));
        assert!(matches!(
            Hash::from_hex(&bad),
            Err(HexError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let key = PublicKey([0x01; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_zero_hash() {
        assert!(Hash::zero().is_zero());
        assert!(!Hash([1; 32]).is_zero());
    }
}
