use crate::encoding::{EncodingError, FieldDescriptor, MessageType, Primitive, Record, RecordType, Value};
use crate::types::primitives::{Hash, Signature};
use serde::{Deserialize, Serialize};

/// Network identifier written into every message header.
pub const NETWORK_ID: u8 = 0;

/// Protocol version written into every message header.
pub const PROTOCOL_VERSION: u8 = 0;

/// Service identifier of consensus messages.
pub const CONSENSUS_SERVICE_ID: u16 = 0;

/// Message type of a precommit vote.
pub const PRECOMMIT_MESSAGE_TYPE: u16 = 4;

/// Length of the `[network_id][version][message_type][service_id][payload]` header.
pub const MESSAGE_HEADER_LENGTH: usize = 10;

/// Serialized size of a block header.
pub const BLOCK_SIZE: usize = 116;

/// Serialized size of a precommit body (without header and signature).
pub const PRECOMMIT_BODY_SIZE: usize = 84;

/// A committed block header.
///
/// `time` is nanoseconds since the Unix epoch. The block hash that validators
/// vote on is `sha256` of the 116-byte serialization under [`block_type`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(with = "u64_string_or_number")]
    pub height: u64,
    pub propose_round: u32,
    #[serde(with = "u64_string_or_number")]
    pub time: u64,
    pub prev_hash: Hash,
    pub tx_hash: Hash,
    pub state_hash: Hash,
}

/// A validator's vote that `block_hash` is final at `height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precommit {
    pub validator: u32,
    #[serde(with = "u64_string_or_number")]
    pub height: u64,
    pub round: u32,
    pub propose_hash: Hash,
    pub block_hash: Hash,
}

/// A precommit body together with its Ed25519 signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPrecommit {
    pub body: Precommit,
    pub signature: Signature,
}

/// A block header plus the precommits that finalized it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockProof {
    pub block: Block,
    pub precommits: Vec<SignedPrecommit>,
}

fn record<const N: usize>(entries: [(&str, Value); N]) -> Record {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

impl Block {
    pub fn to_record(&self) -> Record {
        record([
            ("height", Value::from(self.height)),
            ("propose_round", Value::from(self.propose_round)),
            ("time", Value::from(self.time)),
            ("prev_hash", Value::from(self.prev_hash)),
            ("tx_hash", Value::from(self.tx_hash)),
            ("state_hash", Value::from(self.state_hash)),
        ])
    }
}

impl Precommit {
    pub fn to_record(&self) -> Record {
        record([
            ("validator", Value::from(self.validator)),
            ("height", Value::from(self.height)),
            ("round", Value::from(self.round)),
            ("propose_hash", Value::from(self.propose_hash)),
            ("block_hash", Value::from(self.block_hash)),
        ])
    }
}

/// Layout of a block header: 116 bytes, no variable-length fields.
pub fn block_type() -> Result<RecordType, EncodingError> {
    RecordType::packed(vec![
        ("height", Primitive::Uint64),
        ("propose_round", Primitive::Uint32),
        ("time", Primitive::Timespec),
        ("prev_hash", Primitive::Hash),
        ("tx_hash", Primitive::Hash),
        ("state_hash", Primitive::Hash),
    ])
}

/// Layout of a precommit message. Bytes `[4, 8)` of the body are padding.
pub fn precommit_type() -> Result<MessageType, EncodingError> {
    let body = RecordType::new(
        PRECOMMIT_BODY_SIZE,
        vec![
            ("validator", FieldDescriptor::new(Primitive::Uint32, 0)),
            ("height", FieldDescriptor::new(Primitive::Uint64, 8)),
            ("round", FieldDescriptor::new(Primitive::Uint32, 16)),
            ("propose_hash", FieldDescriptor::new(Primitive::Hash, 20)),
            ("block_hash", FieldDescriptor::new(Primitive::Hash, 52)),
        ],
    )?;
    Ok(MessageType::new(body, PRECOMMIT_MESSAGE_TYPE, CONSENSUS_SERVICE_ID))
}

/// 64-bit integers arrive either as JSON numbers or as decimal strings,
/// since JavaScript hosts cannot hold every `u64` in a number.
mod u64_string_or_number {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            height: 3,
            propose_round: 1,
            time: 1_500_000_000_000_000_000,
            prev_hash: Hash::new([0x11; 32]),
            tx_hash: Hash::new([0x22; 32]),
            state_hash: Hash::new([0x33; 32]),
        }
    }

    #[test]
    fn test_block_layout_size() {
        let ty = block_type().unwrap();
        assert_eq!(ty.size(), BLOCK_SIZE);
        assert!(ty.is_fixed());
    }

    #[test]
    fn test_block_serialization_offsets() {
        let bytes = block_type().unwrap().serialize(&sample_block().to_record()).unwrap();
        assert_eq!(bytes.len(), BLOCK_SIZE);
        assert_eq!(&bytes[0..8], &3u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..20], &1_500_000_000_000_000_000u64.to_le_bytes());
        assert_eq!(&bytes[20..52], &[0x11; 32]);
        assert_eq!(&bytes[52..84], &[0x22; 32]);
        assert_eq!(&bytes[84..116], &[0x33; 32]);
    }

    #[test]
    fn test_precommit_body_padding() {
        let precommit = Precommit {
            validator: 2,
            height: 3,
            round: 1,
            propose_hash: Hash::new([0x44; 32]),
            block_hash: Hash::new([0x55; 32]),
        };
        let ty = precommit_type().unwrap();
        let bytes = ty.serialize(&precommit.to_record()).unwrap();
        assert_eq!(bytes.len(), MESSAGE_HEADER_LENGTH + PRECOMMIT_BODY_SIZE);
        assert_eq!(&bytes[2..4], &PRECOMMIT_MESSAGE_TYPE.to_le_bytes());
        let body = &bytes[MESSAGE_HEADER_LENGTH..];
        assert_eq!(&body[0..4], &2u32.to_le_bytes());
        assert_eq!(&body[4..8], &[0; 4]);
        assert_eq!(&body[8..16], &3u64.to_le_bytes());
        assert_eq!(&body[52..84], &[0x55; 32]);
    }

    #[test]
    fn test_block_json_accepts_string_height() {
        let json = format!(
            r#"{{"height":"18446744073709551615","propose_round":0,"time":5,
                "prev_hash":"{h}","tx_hash":"{h}","state_hash":"{h}"}}"#,
            h = "00".repeat(32)
        );
        let block: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block.height, u64::MAX);
        assert_eq!(block.time, 5);
    }

    #[test]
    fn test_block_json_rejects_short_hash() {
        let json = r#"{"height":1,"propose_round":0,"time":5,
            "prev_hash":"00","tx_hash":"00","state_hash":"00"}"#;
        assert!(serde_json::from_str::<Block>(json).is_err());
    }
}
