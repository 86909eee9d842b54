//! # Lantern WASM
//!
//! WebAssembly bindings for the Lantern light client.
//! This crate bridges `lantern-core`'s pure Rust verification logic to
//! JavaScript via `wasm-bindgen`.
//!
//! ## Architecture
//!
//! - All hashing, signature checks and proof folding happen in Rust/WASM
//! - Inputs are JSON strings (proofs, schemas, records) and hex strings
//!   (hashes, keys, signatures); outputs are JSON or lower-case hex
//! - Stateless: every call verifies against the trusted values passed in
//! - Key generation draws from the browser's `crypto.getRandomValues`

mod api;

use rand_core::OsRng;
use wasm_bindgen::prelude::*;

/// Set up panic hook on WASM initialization.
/// This ensures Rust panics are logged to the browser console with full stack traces.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn to_js(context: &str) -> impl Fn(String) -> JsValue + '_ {
    move |e| {
        log_to_console(&format!("[Lantern] {} rejected: {}", context, e));
        JsValue::from_str(&e)
    }
}

/// Verify a Merkle list range proof.
///
/// request_json: `{ root_hash, count, proof, start, end, element_type? }`
/// where `element_type` is an optional record schema (raw bytes when absent).
///
/// Returns the disclosed elements as a JSON array. An error means the proof
/// must not be trusted.
#[wasm_bindgen(js_name = verifyListProof)]
pub fn verify_list_proof(request_json: &str) -> Result<String, JsValue> {
    api::list_proof(request_json).map_err(to_js("List proof"))
}

/// Verify a Merkle Patricia proof for one key.
///
/// request_json: `{ root_hash, proof, key, element_type? }`; `key` is 32
/// bytes as hex or a byte array.
///
/// Returns the disclosed value as JSON, or `"null"` when the proof shows the
/// key is absent.
#[wasm_bindgen(js_name = verifyMapProof)]
pub fn verify_map_proof(request_json: &str) -> Result<String, JsValue> {
    api::map_proof(request_json).map_err(to_js("Map proof"))
}

/// Returns true iff more than two thirds of `validators_json` (a JSON array
/// of public key hex strings) signed valid precommits for the block in
/// `block_proof_json` (`{ block, precommits }`).
#[wasm_bindgen(js_name = verifyBlock)]
pub fn verify_block(block_proof_json: &str, validators_json: &str) -> bool {
    match api::block(block_proof_json, validators_json) {
        Ok(()) => true,
        Err(e) => {
            log_to_console(&format!("[Lantern] Block rejected: {}", e));
            false
        }
    }
}

/// Serialize a record under a JSON record schema. Returns hex.
#[wasm_bindgen(js_name = serializeRecord)]
pub fn serialize_record(schema_json: &str, data_json: &str) -> Result<String, JsValue> {
    api::serialize_record(schema_json, data_json).map_err(to_js("Record"))
}

/// SHA-256 of a record's serialization. Returns hex.
#[wasm_bindgen(js_name = hashRecord)]
pub fn hash_record(schema_json: &str, data_json: &str) -> Result<String, JsValue> {
    api::hash_record(schema_json, data_json).map_err(to_js("Record"))
}

/// Generate an Ed25519 key pair: `{ "public_key": hex, "secret_key": hex }`.
#[wasm_bindgen(js_name = generateKeyPair)]
pub fn generate_key_pair() -> Result<String, JsValue> {
    api::key_pair(&mut OsRng).map_err(to_js("Key generation"))
}

/// Sign a message under a JSON message schema. Returns the signature hex.
#[wasm_bindgen(js_name = signMessage)]
pub fn sign_message(schema_json: &str, data_json: &str, secret_key: &str) -> Result<String, JsValue> {
    api::sign_message(schema_json, data_json, secret_key).map_err(to_js("Message"))
}

/// Check a message signature. Malformed input is an error; a well-formed
/// but wrong signature is `false`.
#[wasm_bindgen(js_name = verifyMessageSignature)]
pub fn verify_message_signature(
    schema_json: &str,
    data_json: &str,
    signature: &str,
    public_key: &str,
) -> Result<bool, JsValue> {
    api::verify_message_signature(schema_json, data_json, signature, public_key)
        .map_err(to_js("Message"))
}

/// Log a message to the browser console.
fn log_to_console(msg: &str) {
    web_sys::console::log_1(&JsValue::from_str(msg));
}
