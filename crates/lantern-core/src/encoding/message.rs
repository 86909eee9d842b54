use super::error::EncodingError;
use super::field::{to_u32, Primitive};
use super::layout::{serialize_into, FieldDescriptor, RecordType};
use super::value::{Record, Value};
use crate::crypto::{self, SecretKey};
use crate::types::blockchain::{MESSAGE_HEADER_LENGTH, NETWORK_ID, PROTOCOL_VERSION};
use crate::types::primitives::{Hash, PublicKey, Signature, SIGNATURE_LENGTH};

/// Byte range of the `payload` length inside the header.
const PAYLOAD_FROM: usize = 6;
const PAYLOAD_TO: usize = 10;

/// A record layout used as the body of a signed message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageType {
    body: RecordType,
    message_type: u16,
    service_id: u16,
}

impl MessageType {
    pub fn new(body: RecordType, message_type: u16, service_id: u16) -> Self {
        Self {
            body,
            message_type,
            service_id,
        }
    }

    pub fn body(&self) -> &RecordType {
        &self.body
    }

    pub fn message_type(&self) -> u16 {
        self.message_type
    }

    pub fn service_id(&self) -> u16 {
        self.service_id
    }

    /// The bytes a signature covers: header and body, no signature.
    pub fn serialize(&self, data: &Record) -> Result<Vec<u8>, EncodingError> {
        serialize_message(data, self, None)
    }

    /// The full wire form: header, body, then the 64-byte signature.
    pub fn serialize_signed(
        &self,
        data: &Record,
        signature: &Signature,
    ) -> Result<Vec<u8>, EncodingError> {
        serialize_message(data, self, Some(signature))
    }

    /// Sign the pre-signature serialization of `data`.
    pub fn sign(&self, data: &Record, secret_key: &SecretKey) -> Result<Signature, EncodingError> {
        let bytes = self.serialize(data)?;
        Ok(crypto::sign(&bytes, secret_key)?)
    }

    /// Check `signature` over the pre-signature serialization of `data`.
    pub fn verify_signature(
        &self,
        data: &Record,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<bool, EncodingError> {
        let bytes = self.serialize(data)?;
        Ok(crypto::verify_signature(&bytes, signature, public_key))
    }

    /// Hash of the complete signed message, which identifies it on the network.
    pub fn hash(&self, data: &Record, signature: &Signature) -> Result<Hash, EncodingError> {
        Ok(crypto::hash(&self.serialize_signed(data, signature)?))
    }
}

/// Layout of the 10-byte message header.
pub fn header_type() -> Result<RecordType, EncodingError> {
    RecordType::new(
        MESSAGE_HEADER_LENGTH,
        vec![
            ("network_id", FieldDescriptor::new(Primitive::Uint8, 0)),
            ("version", FieldDescriptor::new(Primitive::Uint8, 1)),
            ("message_type", FieldDescriptor::new(Primitive::Uint16, 2)),
            ("service_id", FieldDescriptor::new(Primitive::Uint16, 4)),
            ("payload", FieldDescriptor::new(Primitive::Uint32, PAYLOAD_FROM)),
        ],
    )
}

/// Serialize a message: `[header(10)][body][signature(64)]`.
///
/// `payload` in the header is always `body length + 64`, whether or not the
/// signature is appended, so signer and verifier hash identical bytes.
pub fn serialize_message(
    data: &Record,
    ty: &MessageType,
    signature: Option<&Signature>,
) -> Result<Vec<u8>, EncodingError> {
    let header: Record = [
        ("network_id", Value::from(NETWORK_ID)),
        ("version", Value::from(PROTOCOL_VERSION)),
        ("message_type", Value::from(ty.message_type)),
        ("service_id", Value::from(ty.service_id)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let mut buffer = Vec::with_capacity(MESSAGE_HEADER_LENGTH + ty.body.size() + SIGNATURE_LENGTH);
    serialize_into(&mut buffer, 0, &header, &header_type()?)?;
    serialize_into(&mut buffer, MESSAGE_HEADER_LENGTH, data, &ty.body)?;

    let body_length = buffer.len() - MESSAGE_HEADER_LENGTH;
    let payload = to_u32(body_length + SIGNATURE_LENGTH)?;
    Primitive::Uint32.encode(&Value::from(payload), &mut buffer, PAYLOAD_FROM, PAYLOAD_TO)?;

    if let Some(signature) = signature {
        buffer.extend_from_slice(signature.as_bytes());
    }
    Ok(buffer)
}
