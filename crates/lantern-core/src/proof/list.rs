//! Range proofs over a Merkle list.
//!
//! A list of `count` elements is the leaf row of a binary tree of height
//! `ceil(log2(count))`. A branch whose right subtree holds no elements has
//! no right child and hashes as `sha256(left)`; every other branch hashes as
//! `sha256(left ++ right)`. Leaves hash as their element hash.

use super::ElementType;
use crate::crypto;
use crate::encoding::{EncodingError, Value};
use crate::types::primitives::Hash;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors during list proof verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListProofError {
    #[error("Proof is empty but the list holds {count} elements")]
    EmptyProof { count: u64 },

    #[error("Proof for an empty list must be empty")]
    UnexpectedProof,

    #[error("Branch node has no left child")]
    MissingLeftChild,

    #[error("Malformed proof node: {reason}")]
    MalformedNode { reason: String },

    #[error("Invalid range [{start}, {end}]: start is past end")]
    InvalidRange { start: u64, end: u64 },

    #[error("Leaf at depth {depth}, index {index}: leaves must sit at depth {height}")]
    UnexpectedLeaf { depth: u32, index: u64, height: u32 },

    #[error("Branch at depth {depth}, index {index} is below the leaf row")]
    UnexpectedBranch { depth: u32, index: u64 },

    #[error("Leaf {index} lies outside the requested range [{start}, {end}]")]
    LeafOutOfRange { index: u64, start: u64, end: u64 },

    #[error("Leaf {index} disclosed out of order: expected leaf {expected}")]
    UnorderedLeaf { index: u64, expected: u64 },

    #[error("Branch at depth {depth}, index {index} has no right child but its right subtree holds elements")]
    MissingRightChild { depth: u32, index: u64 },

    #[error("Invalid leaf value: {0}")]
    InvalidValue(#[from] EncodingError),

    #[error("Proof root {computed} does not match expected root {expected}")]
    RootHashMismatch { computed: Hash, expected: Hash },

    #[error("Proof disclosed {found} elements, expected {expected}")]
    MissingElements { expected: u64, found: u64 },
}

/// A node of a list proof.
///
/// JSON shape: a hex string is a pruned subtree hash, `{ "val": v }` is a
/// disclosed leaf, and `{ "left": .., "right": .. }` is a branch whose
/// `right` may be absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListProofNode {
    Branch {
        left: Box<ListProofNode>,
        right: Option<Box<ListProofNode>>,
    },
    Pruned(Hash),
    Leaf(Value),
}

impl ListProofNode {
    pub fn branch(left: ListProofNode, right: Option<ListProofNode>) -> Self {
        ListProofNode::Branch {
            left: Box::new(left),
            right: right.map(Box::new),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self, ListProofError> {
        use serde_json::Value as Json;

        match json {
            Json::String(s) => Hash::from_hex(s)
                .map(ListProofNode::Pruned)
                .map_err(|e| ListProofError::MalformedNode {
                    reason: format!("pruned hash: {}", e),
                }),
            Json::Object(map) => {
                if let Some(val) = map.get("val") {
                    return Ok(ListProofNode::Leaf(Value::try_from(val.clone())?));
                }
                let left = map.get("left").ok_or(ListProofError::MissingLeftChild)?;
                let right = match map.get("right") {
                    None | Some(Json::Null) => None,
                    Some(right) => Some(Box::new(Self::from_json(right)?)),
                };
                Ok(ListProofNode::Branch {
                    left: Box::new(Self::from_json(left)?),
                    right,
                })
            }
            other => Err(ListProofError::MalformedNode {
                reason: format!("expected a hash or an object, got {}", other),
            }),
        }
    }

    /// Like [`from_json`](Self::from_json), but `null` and `{}` mean "no proof".
    pub fn from_json_opt(json: &serde_json::Value) -> Result<Option<Self>, ListProofError> {
        match json {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Object(map) if map.is_empty() => Ok(None),
            other => Self::from_json(other).map(Some),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            ListProofNode::Pruned(hash) => serde_json::Value::String(hash.to_hex()),
            ListProofNode::Leaf(value) => serde_json::json!({ "val": value }),
            ListProofNode::Branch { left, right } => {
                let mut map = serde_json::Map::new();
                map.insert("left".to_string(), left.to_json());
                if let Some(right) = right {
                    map.insert("right".to_string(), right.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

impl Serialize for ListProofNode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ListProofNode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// Height of the tree over `count` leaves: the least `h` with `2^h >= count`.
pub fn tree_height(count: u64) -> u32 {
    count
        .checked_next_power_of_two()
        .map(u64::trailing_zeros)
        .unwrap_or(64)
}

/// Verify a proof that elements `[start, end]` of a list of `count`
/// elements belong to the list with root `root`.
///
/// `end` is clamped to the last element. Returns the disclosed elements in
/// order; a range starting past the end of the list yields an empty vector
/// without inspecting the proof.
pub fn verify_list_proof(
    root: &Hash,
    count: u64,
    proof: Option<&ListProofNode>,
    start: u64,
    end: u64,
    element_type: ElementType<'_>,
) -> Result<Vec<Value>, ListProofError> {
    if start > end {
        return Err(ListProofError::InvalidRange { start, end });
    }

    if count == 0 {
        if proof.is_some() {
            return Err(ListProofError::UnexpectedProof);
        }
        if !root.is_zero() {
            return Err(ListProofError::RootHashMismatch {
                computed: Hash::zero(),
                expected: *root,
            });
        }
        return Ok(Vec::new());
    }

    if start >= count {
        return Ok(Vec::new());
    }

    let proof = proof.ok_or(ListProofError::EmptyProof { count })?;
    let end = end.min(count - 1);
    let mut walker = ListWalker {
        count,
        height: tree_height(count),
        start,
        end,
        element_type,
        values: Vec::new(),
    };

    let computed = walker.walk(proof, 0, 0).map_err(|e| {
        warn!(count, start, end, error = %e, "Rejected list proof");
        e
    })?;
    if computed != *root {
        warn!(count, %computed, expected = %root, "List proof root mismatch");
        return Err(ListProofError::RootHashMismatch {
            computed,
            expected: *root,
        });
    }

    let expected = end - start + 1;
    let found = walker.values.len() as u64;
    if found != expected {
        return Err(ListProofError::MissingElements { expected, found });
    }

    debug!(count, start, end, "List proof verified");
    Ok(walker.values)
}

struct ListWalker<'a> {
    count: u64,
    height: u32,
    start: u64,
    end: u64,
    element_type: ElementType<'a>,
    values: Vec<Value>,
}

impl ListWalker<'_> {
    /// Fold the subtree rooted at node `index` of row `depth` into its hash.
    fn walk(&mut self, node: &ListProofNode, depth: u32, index: u64) -> Result<Hash, ListProofError> {
        match node {
            ListProofNode::Pruned(hash) => Ok(*hash),
            ListProofNode::Leaf(value) => self.leaf(value, depth, index),
            ListProofNode::Branch { left, right } => {
                if depth >= self.height {
                    return Err(ListProofError::UnexpectedBranch { depth, index });
                }
                let left_hash = self.walk(left, depth + 1, index * 2)?;
                match right {
                    Some(right) => {
                        let right_hash = self.walk(right, depth + 1, index * 2 + 1)?;
                        Ok(crypto::hash_parts(&[left_hash.as_ref(), right_hash.as_ref()]))
                    }
                    None => {
                        let first_right = (index * 2 + 1) << (self.height - depth - 1);
                        if first_right < self.count {
                            return Err(ListProofError::MissingRightChild { depth, index });
                        }
                        Ok(crypto::hash(left_hash.as_ref()))
                    }
                }
            }
        }
    }

    fn leaf(&mut self, value: &Value, depth: u32, index: u64) -> Result<Hash, ListProofError> {
        if depth != self.height {
            return Err(ListProofError::UnexpectedLeaf {
                depth,
                index,
                height: self.height,
            });
        }
        if index < self.start || index > self.end {
            return Err(ListProofError::LeafOutOfRange {
                index,
                start: self.start,
                end: self.end,
            });
        }
        let expected = self.start + self.values.len() as u64;
        if index != expected {
            return Err(ListProofError::UnorderedLeaf { index, expected });
        }
        let hash = self.element_type.hash(value)?;
        self.values.push(value.clone());
        Ok(hash)
    }
}
