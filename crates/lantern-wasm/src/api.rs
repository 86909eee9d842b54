//! JSON request adapter.
//!
//! JavaScript hosts hand proofs, schemas and records over as JSON strings.
//! This module defines serde types matching that format, converts them to
//! lantern-core types and runs the core verification.
//!
//! Key differences from the core types:
//! - 64-bit counts may arrive as numbers or decimal strings
//! - Map keys may arrive as hex strings or byte arrays
//! - Element types are optional record schemas (absent means raw bytes)

use lantern_core::encoding::{MessageSchema, RecordSchema};
use lantern_core::proof::list::{verify_list_proof, ListProofNode};
use lantern_core::proof::map::{verify_map_proof, MapProofNode};
use lantern_core::{
    verify_block, BlockProof, ElementType, Hash, KeyPair, PublicKey, Record, RecordType, SecretKey,
    Signature, Value,
};
use rand_core::{CryptoRng, RngCore};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

/// A `u64` given as a JSON number or a decimal string.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum ApiU64 {
    Number(u64),
    Text(String),
}

impl ApiU64 {
    pub fn to_u64(&self) -> Result<u64, String> {
        match self {
            ApiU64::Number(n) => Ok(*n),
            ApiU64::Text(s) => s.parse::<u64>().map_err(|e| format!("parse u64: {}", e)),
        }
    }
}

/// A 32-byte map key given as hex or as an array of bytes.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum ApiKey {
    Hex(String),
    Bytes(Vec<u8>),
}

impl ApiKey {
    pub fn to_bytes32(&self) -> Result<[u8; 32], String> {
        let hash = match self {
            ApiKey::Hex(s) => Hash::from_hex(s),
            ApiKey::Bytes(bytes) => Hash::from_slice(bytes),
        };
        hash.map(|h| h.0).map_err(|e| format!("key: {}", e))
    }
}

fn record_type(schema: Option<&RecordSchema>) -> Result<Option<RecordType>, String> {
    schema
        .map(|s| s.build().map_err(|e| format!("element type: {}", e)))
        .transpose()
}

fn element_type(ty: Option<&RecordType>) -> ElementType<'_> {
    ty.map_or(ElementType::Raw, ElementType::Record)
}

fn parse_record(data_json: &str) -> Result<Record, String> {
    match serde_json::from_str::<Value>(data_json).map_err(|e| format!("Invalid record JSON: {}", e))? {
        Value::Record(record) => Ok(record),
        other => Err(format!("record must be a JSON object, got {}", other.kind_name())),
    }
}

fn parse_record_schema(schema_json: &str) -> Result<RecordType, String> {
    let schema: RecordSchema =
        serde_json::from_str(schema_json).map_err(|e| format!("Invalid schema JSON: {}", e))?;
    schema.build().map_err(|e| e.to_string())
}

fn parse_message_schema(schema_json: &str) -> Result<lantern_core::MessageType, String> {
    let schema: MessageSchema =
        serde_json::from_str(schema_json).map_err(|e| format!("Invalid schema JSON: {}", e))?;
    schema.build().map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Proof requests
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ApiListProofRequest {
    pub root_hash: Hash,
    pub count: ApiU64,
    #[serde(default)]
    pub proof: serde_json::Value,
    pub start: ApiU64,
    pub end: ApiU64,
    #[serde(default)]
    pub element_type: Option<RecordSchema>,
}

#[derive(Deserialize)]
pub struct ApiMapProofRequest {
    pub root_hash: Hash,
    pub proof: serde_json::Value,
    pub key: ApiKey,
    #[serde(default)]
    pub element_type: Option<RecordSchema>,
}

/// Verify a list proof; returns the disclosed elements as a JSON array.
pub fn list_proof(request_json: &str) -> Result<String, String> {
    let request: ApiListProofRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid request JSON: {}", e))?;
    let proof = ListProofNode::from_json_opt(&request.proof).map_err(|e| e.to_string())?;
    let ty = record_type(request.element_type.as_ref())?;

    let values = verify_list_proof(
        &request.root_hash,
        request.count.to_u64()?,
        proof.as_ref(),
        request.start.to_u64()?,
        request.end.to_u64()?,
        element_type(ty.as_ref()),
    )
    .map_err(|e| e.to_string())?;
    serde_json::to_string(&values).map_err(|e| e.to_string())
}

/// Verify a map proof; returns the disclosed value, or `null` when absent.
pub fn map_proof(request_json: &str) -> Result<String, String> {
    let request: ApiMapProofRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid request JSON: {}", e))?;
    let proof = MapProofNode::from_json(&request.proof).map_err(|e| e.to_string())?;
    let key = request.key.to_bytes32()?;
    let ty = record_type(request.element_type.as_ref())?;

    let value = verify_map_proof(&request.root_hash, &proof, &key, element_type(ty.as_ref()))
        .map_err(|e| e.to_string())?;
    serde_json::to_string(&value).map_err(|e| e.to_string())
}

/// Check that `{ block, precommits }` carries a validator supermajority.
pub fn block(block_proof_json: &str, validators_json: &str) -> Result<(), String> {
    let proof: BlockProof = serde_json::from_str(block_proof_json)
        .map_err(|e| format!("Invalid block proof JSON: {}", e))?;
    let validators: Vec<PublicKey> = serde_json::from_str(validators_json)
        .map_err(|e| format!("Invalid validator keys JSON: {}", e))?;
    verify_block(&proof, &validators).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Records, messages and keys
// ---------------------------------------------------------------------------

/// Serialize a record under a JSON schema; returns lower-case hex.
pub fn serialize_record(schema_json: &str, data_json: &str) -> Result<String, String> {
    let ty = parse_record_schema(schema_json)?;
    let bytes = ty.serialize(&parse_record(data_json)?).map_err(|e| e.to_string())?;
    Ok(hex::encode(bytes))
}

/// `sha256` of the record serialization, as hex.
pub fn hash_record(schema_json: &str, data_json: &str) -> Result<String, String> {
    let ty = parse_record_schema(schema_json)?;
    let hash = ty.hash(&parse_record(data_json)?).map_err(|e| e.to_string())?;
    Ok(hash.to_hex())
}

/// Fresh key pair as `{ "public_key": hex, "secret_key": hex }`.
pub fn key_pair<R: RngCore + CryptoRng>(rng: &mut R) -> Result<String, String> {
    serde_json::to_string(&KeyPair::generate(rng)).map_err(|e| e.to_string())
}

/// Sign a message under a JSON message schema; returns the signature hex.
pub fn sign_message(schema_json: &str, data_json: &str, secret_key: &str) -> Result<String, String> {
    let ty = parse_message_schema(schema_json)?;
    let secret_key = SecretKey::from_hex(secret_key).map_err(|e| format!("secret key: {}", e))?;
    let signature = ty
        .sign(&parse_record(data_json)?, &secret_key)
        .map_err(|e| e.to_string())?;
    Ok(signature.to_hex())
}

pub fn verify_message_signature(
    schema_json: &str,
    data_json: &str,
    signature: &str,
    public_key: &str,
) -> Result<bool, String> {
    let ty = parse_message_schema(schema_json)?;
    let signature = Signature::from_hex(signature).map_err(|e| format!("signature: {}", e))?;
    let public_key = PublicKey::from_hex(public_key).map_err(|e| format!("public key: {}", e))?;
    ty.verify_signature(&parse_record(data_json)?, &signature, &public_key)
        .map_err(|e| e.to_string())
}
