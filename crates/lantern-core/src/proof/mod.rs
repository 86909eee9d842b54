//! Merkle proof verification.
//!
//! Both verifiers take a trusted root hash and an untrusted proof tree, fold
//! the tree back into a root and disclose leaf values only when the fold
//! matches. A `list` proof discloses a contiguous range of an append-only
//! list; a `map` proof discloses (or proves absent) one key of a Patricia
//! trie keyed by 256-bit values.

pub mod list;
pub mod map;

use crate::crypto;
use crate::encoding::{EncodingError, Primitive, RecordType, Value};
use crate::types::primitives::Hash;

/// How disclosed leaf values are hashed.
#[derive(Clone, Copy, Debug)]
pub enum ElementType<'a> {
    /// Leaves are byte arrays hashed as-is.
    Raw,
    /// Leaves are single primitives hashed over their encoded segment.
    /// `String` leaves hash their UTF-8 bytes with no pointer.
    Primitive(Primitive),
    /// Leaves are records hashed over their serialization.
    Record(&'a RecordType),
}

impl ElementType<'_> {
    pub fn hash(&self, value: &Value) -> Result<Hash, EncodingError> {
        match (self, value) {
            (ElementType::Raw, Value::Bytes(bytes)) => Ok(crypto::hash(bytes)),
            (ElementType::Primitive(Primitive::String), Value::Text(text)) => {
                Ok(crypto::hash(text.as_bytes()))
            }
            (ElementType::Primitive(Primitive::String), other) => {
                Err(EncodingError::TypeMismatch {
                    kind: "String",
                    expected: "a string",
                    got: other.kind_name(),
                })
            }
            (ElementType::Primitive(p), value) => {
                let mut segment = vec![0; p.size()];
                p.encode(value, &mut segment, 0, p.size())?;
                Ok(crypto::hash(&segment))
            }
            (ElementType::Record(ty), Value::Record(record)) => ty.hash(record),
            (ElementType::Raw, other) => Err(EncodingError::TypeMismatch {
                kind: "raw element",
                expected: "byte array",
                got: other.kind_name(),
            }),
            (ElementType::Record(_), other) => Err(EncodingError::TypeMismatch {
                kind: "record element",
                expected: "record",
                got: other.kind_name(),
            }),
        }
    }
}
