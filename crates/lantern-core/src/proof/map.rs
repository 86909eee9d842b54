//! Proofs of presence or absence in a Merkle Patricia trie.
//!
//! Keys are 256-bit values read as bit strings, most significant bit of each
//! byte first. A proof node maps edge labels (bit strings) to children; an
//! edge whose cumulative path reaches 256 bits ends in a leaf, a shorter one
//! in another branch. Each branch hashes as
//! `sha256(left_hash ++ right_hash ++ left_key ++ right_key)` where the keys
//! are 34-byte [`DbKey`] encodings of the children's full paths.

use super::ElementType;
use crate::crypto;
use crate::encoding::{EncodingError, Value};
use crate::types::primitives::{Hash, HASH_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Bit length of a trie key.
pub const MAP_KEY_BITS: usize = 256;

/// Serialized length of a [`DbKey`].
pub const DB_KEY_SIZE: usize = 34;

/// Errors during Patricia trie proof verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapProofError {
    #[error("Malformed proof node: {reason}")]
    MalformedNode { reason: String },

    #[error("Invalid key path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Branch below prefix {prefix:?} must split into one child continuing with 0 and one with 1")]
    InvalidBranch { prefix: String },

    #[error("Leaf disclosed at prefix {prefix:?}, which is shorter than a full key")]
    UnexpectedLeaf { prefix: String },

    #[error("Branch disclosed at full key {prefix:?}")]
    UnexpectedBranch { prefix: String },

    #[error("Pruned subtree at prefix {prefix:?} covers the requested key")]
    UnderPrunedBranch { prefix: String },

    #[error("Proof contains the requested key but only as a hash")]
    ValueNotDisclosed,

    #[error("Proof discloses a value for key {key}, which is not the requested key")]
    DisclosedKeyMismatch { key: String },

    #[error("Invalid leaf value: {0}")]
    InvalidValue(#[from] EncodingError),

    #[error("Proof root {computed} does not match expected root {expected}")]
    RootHashMismatch { computed: Hash, expected: Hash },
}

/// A trie path prefix as it enters branch hashes.
///
/// Encodes to 34 bytes: a variant byte (`1` for a full 256-bit leaf key,
/// `0` for a branch prefix), the 32 path bytes with unused bits zeroed, and
/// the prefix length in bits (`0` for leaf keys).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DbKey {
    data: [u8; HASH_SIZE],
    bits: u16,
}

impl DbKey {
    pub fn leaf(key: &[u8; HASH_SIZE]) -> Self {
        Self {
            data: *key,
            bits: MAP_KEY_BITS as u16,
        }
    }

    /// Parse a string of `'0'`/`'1'` characters of at most 256 bits.
    pub fn from_bits(path: &str) -> Result<Self, MapProofError> {
        let invalid = |reason: &str| MapProofError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        if path.len() > MAP_KEY_BITS {
            return Err(invalid("longer than 256 bits"));
        }
        let mut data = [0u8; HASH_SIZE];
        for (i, c) in path.bytes().enumerate() {
            match c {
                b'0' => {}
                b'1' => data[i / 8] |= 0x80 >> (i % 8),
                _ => return Err(invalid("only 0 and 1 are allowed")),
            }
        }
        Ok(Self {
            data,
            bits: path.len() as u16,
        })
    }

    pub fn is_leaf(&self) -> bool {
        usize::from(self.bits) == MAP_KEY_BITS
    }

    pub fn to_bytes(&self) -> [u8; DB_KEY_SIZE] {
        let mut out = [0u8; DB_KEY_SIZE];
        out[1..=HASH_SIZE].copy_from_slice(&self.data);
        if self.is_leaf() {
            out[0] = 1;
        } else {
            out[DB_KEY_SIZE - 1] = self.bits as u8;
        }
        out
    }
}

/// Render a key as 256 `'0'`/`'1'` characters.
pub fn key_to_bits(key: &[u8; HASH_SIZE]) -> String {
    key.iter().map(|byte| format!("{:08b}", byte)).collect()
}

/// Child of a Patricia proof node, keyed by its edge label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MapProofChild {
    /// Hash of a subtree or leaf left out of the proof.
    Pruned(Hash),
    /// An expanded branch.
    Branch(MapProofNode),
    /// A disclosed value at a full 256-bit key.
    Leaf(Value),
}

/// A Patricia proof node: edge labels mapped to children.
///
/// JSON shape: `{ "0101..": child, "1..": child }` where a child is a hex
/// hash, `{ "val": v }`, or another node object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapProofNode(pub BTreeMap<String, MapProofChild>);

impl MapProofNode {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, MapProofError> {
        let map = json.as_object().ok_or_else(|| MapProofError::MalformedNode {
            reason: format!("expected an object, got {}", json),
        })?;
        let mut children = BTreeMap::new();
        for (label, child) in map {
            let child = match child {
                serde_json::Value::String(s) => {
                    MapProofChild::Pruned(Hash::from_hex(s).map_err(|e| {
                        MapProofError::MalformedNode {
                            reason: format!("pruned hash at {:?}: {}", label, e),
                        }
                    })?)
                }
                serde_json::Value::Object(object) => match object.get("val") {
                    Some(val) => MapProofChild::Leaf(Value::try_from(val.clone())?),
                    None => MapProofChild::Branch(Self::from_json(child)?),
                },
                other => {
                    return Err(MapProofError::MalformedNode {
                        reason: format!("child {:?} must be a hash or an object, got {}", label, other),
                    })
                }
            };
            children.insert(label.clone(), child);
        }
        Ok(Self(children))
    }

    fn to_json(&self) -> serde_json::Value {
        let map = self
            .0
            .iter()
            .map(|(label, child)| {
                let child = match child {
                    MapProofChild::Pruned(hash) => serde_json::Value::String(hash.to_hex()),
                    MapProofChild::Branch(node) => node.to_json(),
                    MapProofChild::Leaf(value) => serde_json::json!({ "val": value }),
                };
                (label.clone(), child)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for MapProofNode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MapProofNode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// Hash of a branch given both children's hashes and full paths.
pub fn hash_branch(left_hash: &Hash, right_hash: &Hash, left_key: &DbKey, right_key: &DbKey) -> Hash {
    crypto::hash_parts(&[
        left_hash.as_ref(),
        right_hash.as_ref(),
        &left_key.to_bytes(),
        &right_key.to_bytes(),
    ])
}

/// Root hash of a trie holding exactly one entry.
pub fn hash_single_entry(key: &[u8; HASH_SIZE], value_hash: &Hash) -> Hash {
    crypto::hash_parts(&[&DbKey::leaf(key).to_bytes(), value_hash.as_ref()])
}

/// Verify a Patricia proof for `key` against `root`.
///
/// Returns `Some(value)` when the proof discloses the key, `None` when it
/// proves the key absent (including the empty trie).
pub fn verify_map_proof(
    root: &Hash,
    proof: &MapProofNode,
    key: &[u8; HASH_SIZE],
    element_type: ElementType<'_>,
) -> Result<Option<Value>, MapProofError> {
    let key_bits = key_to_bits(key);
    let result = match proof.0.len() {
        0 => verify_empty(root),
        1 => verify_single_entry(root, proof, &key_bits, element_type),
        _ => {
            let mut folder = MapFolder {
                key_bits: &key_bits,
                element_type,
                disclosed: None,
            };
            folder.fold(proof, "", true).and_then(|computed| {
                check_root(computed, root)?;
                Ok(folder.disclosed)
            })
        }
    };

    match &result {
        Ok(Some(_)) => debug!(key = %hex::encode(key), "Map proof verified: key present"),
        Ok(None) => debug!(key = %hex::encode(key), "Map proof verified: key absent"),
        Err(e) => warn!(key = %hex::encode(key), error = %e, "Rejected map proof"),
    }
    result
}

fn check_root(computed: Hash, expected: &Hash) -> Result<(), MapProofError> {
    if computed != *expected {
        return Err(MapProofError::RootHashMismatch {
            computed,
            expected: *expected,
        });
    }
    Ok(())
}

fn verify_empty(root: &Hash) -> Result<Option<Value>, MapProofError> {
    check_root(Hash::zero(), root)?;
    Ok(None)
}

fn verify_single_entry(
    root: &Hash,
    proof: &MapProofNode,
    key_bits: &str,
    element_type: ElementType<'_>,
) -> Result<Option<Value>, MapProofError> {
    let Some((label, child)) = proof.0.iter().next() else {
        return verify_empty(root);
    };
    let entry_key = DbKey::from_bits(label)?;
    if !entry_key.is_leaf() {
        return Err(MapProofError::InvalidPath {
            path: label.clone(),
            reason: "the sole entry of a trie must carry a full 256-bit key".to_string(),
        });
    }

    let (value_hash, value) = match child {
        MapProofChild::Pruned(hash) => (*hash, None),
        MapProofChild::Leaf(value) => (element_type.hash(value)?, Some(value)),
        MapProofChild::Branch(_) => {
            return Err(MapProofError::UnexpectedBranch {
                prefix: label.clone(),
            })
        }
    };
    check_root(hash_single_entry(&entry_key.data, &value_hash), root)?;

    if label != key_bits {
        return Ok(None);
    }
    value.cloned().map(Some).ok_or(MapProofError::ValueNotDisclosed)
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

struct MapFolder<'a> {
    key_bits: &'a str,
    element_type: ElementType<'a>,
    disclosed: Option<Value>,
}

impl MapFolder<'_> {
    /// Fold the branch below `prefix` into its hash.
    ///
    /// Below the root both edge labels start right after the branch point,
    /// one with `0` and one with `1`. Root labels are full paths from bit 0
    /// and may share the root branch's own prefix before they split.
    fn fold(&mut self, node: &MapProofNode, prefix: &str, is_root: bool) -> Result<Hash, MapProofError> {
        let invalid = || MapProofError::InvalidBranch {
            prefix: prefix.to_string(),
        };
        if node.0.len() != 2 {
            return Err(invalid());
        }
        let mut children = node.0.iter();
        let (Some(left), Some(right)) = (children.next(), children.next()) else {
            return Err(invalid());
        };
        let split = common_prefix_len(left.0, right.0);
        if split > 0 && !is_root {
            return Err(invalid());
        }
        // Labels are sorted, so a valid pair has 0 then 1 at the split.
        if left.0.as_bytes().get(split) != Some(&b'0') || right.0.as_bytes().get(split) != Some(&b'1') {
            return Err(invalid());
        }

        let (left_hash, left_key) = self.child(prefix, left.0, left.1)?;
        let (right_hash, right_key) = self.child(prefix, right.0, right.1)?;
        Ok(hash_branch(&left_hash, &right_hash, &left_key, &right_key))
    }

    fn child(
        &mut self,
        prefix: &str,
        label: &str,
        child: &MapProofChild,
    ) -> Result<(Hash, DbKey), MapProofError> {
        let path = format!("{}{}", prefix, label);
        let db_key = DbKey::from_bits(&path)?;
        let on_key_path = self.key_bits.starts_with(path.as_str());

        let hash = match (child, db_key.is_leaf()) {
            (MapProofChild::Pruned(hash), _) => {
                if on_key_path {
                    return Err(if db_key.is_leaf() {
                        MapProofError::ValueNotDisclosed
                    } else {
                        MapProofError::UnderPrunedBranch { prefix: path }
                    });
                }
                *hash
            }
            (MapProofChild::Branch(node), false) => self.fold(node, &path, false)?,
            (MapProofChild::Leaf(value), true) => {
                if !on_key_path {
                    return Err(MapProofError::DisclosedKeyMismatch {
                        key: hex::encode(db_key.data),
                    });
                }
                let hash = self.element_type.hash(value)?;
                self.disclosed = Some(value.clone());
                hash
            }
            (MapProofChild::Branch(_), true) => {
                return Err(MapProofError::UnexpectedBranch { prefix: path })
            }
            (MapProofChild::Leaf(_), false) => {
                return Err(MapProofError::UnexpectedLeaf { prefix: path })
            }
        };
        Ok((hash, db_key))
    }
}
