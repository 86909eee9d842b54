//! # Lantern Core
//!
//! Pure Rust light client verification for Exonum-style ledgers.
//!
//! This crate contains **no networking code** and **no WASM dependencies**.
//! A caller trusts only a root hash and a validator key set; every byte a
//! full node hands over passes through these functions before it is trusted.
//!
//! ## Trust Model
//!
//! - **Block consensus** (`consensus` module): a block is final when more
//!   than two thirds of the validators signed precommits for its hash. Trusts
//!   that fewer than one third of the validators are faulty.
//!
//! - **State proofs** (`proof` module): Merkle list range proofs and Merkle
//!   Patricia trie proofs fold back into a root hash taken from a verified
//!   block. Zero trust assumptions beyond that root.
//!
//! - **Encoding** (`encoding` module): the byte-exact record and message
//!   layouts that hashes and signatures are computed over.
//!
//! ## Usage
//!
//! ```ignore
//! use lantern_core::consensus::verify_block;
//! use lantern_core::proof::{list::verify_list_proof, map::verify_map_proof, ElementType};
//! ```

pub mod consensus;
pub mod crypto;
pub mod encoding;
pub mod proof;
pub mod types;

// Re-export commonly used types for convenience
pub use consensus::{block_hash, is_block_committed, quorum_threshold, verify_block, ConsensusError};
pub use crypto::{CryptoError, KeyPair, SecretKey};
pub use encoding::{EncodingError, MessageType, Primitive, Record, RecordType, Value};
pub use proof::{
    list::{verify_list_proof, ListProofError, ListProofNode},
    map::{verify_map_proof, MapProofChild, MapProofError, MapProofNode},
    ElementType,
};
pub use types::{blockchain::*, primitives::*};
