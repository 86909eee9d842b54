//! SHA-256 hashing and Ed25519 signing primitives.
//!
//! Everything in the proof and consensus modules hashes through [`hash`], and
//! every signature check goes through [`verify_signature`]. Key generation
//! takes its random source as an argument so hosts (and tests) decide where
//! entropy comes from.

use crate::types::primitives::*;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Errors from key handling and signing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid secret key: {reason}")]
    InvalidSecretKey { reason: String },

    #[error("Invalid hex in secret key: {0}")]
    InvalidHex(#[from] HexError),
}

/// SHA256 hash of arbitrary data.
pub fn hash(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    finalize(hasher)
}

/// SHA256 hash of several byte slices fed in order, without concatenating them first.
pub fn hash_parts(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    finalize(hasher)
}

fn finalize(hasher: Sha256) -> Hash {
    let result = hasher.finalize();
    let mut output = [0u8; HASH_SIZE];
    output.copy_from_slice(&result);
    Hash(output)
}

/// An Ed25519 secret key in the 64-byte `seed || public_key` form.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(pub [u8; SECRET_KEY_LENGTH]);

impl SecretKey {
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Ok(Self(decode_hex_array::<SECRET_KEY_LENGTH>(s)?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The public half embedded in the last 32 bytes.
    pub fn public_key(&self) -> PublicKey {
        let mut pk = [0u8; PUBLIC_KEY_LENGTH];
        pk.copy_from_slice(&self.0[SECRET_KEY_LENGTH - PUBLIC_KEY_LENGTH..]);
        PublicKey(pk)
    }

    fn signing_key(&self) -> Result<SigningKey, CryptoError> {
        SigningKey::from_keypair_bytes(&self.0).map_err(|e| CryptoError::InvalidSecretKey {
            reason: e.to_string(),
        })
    }
}

// Never print secret material.
impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl Serialize for SecretKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An Ed25519 key pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the supplied random source.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Deterministically derive a key pair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self {
            public_key: PublicKey(signing_key.verifying_key().to_bytes()),
            secret_key: SecretKey(signing_key.to_keypair_bytes()),
        }
    }

    pub fn sign(&self, data: &[u8]) -> Result<Signature, CryptoError> {
        sign(data, &self.secret_key)
    }
}

/// Produce a detached Ed25519 signature over `data`.
pub fn sign(data: &[u8], secret_key: &SecretKey) -> Result<Signature, CryptoError> {
    let signing_key = secret_key.signing_key()?;
    Ok(Signature(signing_key.sign(data).to_bytes()))
}

/// Check a detached Ed25519 signature.
///
/// Malformed public keys (bytes that are not a curve point) simply fail
/// verification; they are untrusted input like the signature itself.
pub fn verify_signature(data: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(&public_key.0) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(data, &sig).is_ok()
}
