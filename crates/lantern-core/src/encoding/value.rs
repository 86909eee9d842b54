use super::error::EncodingError;
use crate::types::primitives::{Hash, PublicKey, Signature};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest integer a JavaScript number holds exactly.
const MAX_SAFE_INTEGER: u128 = (1 << 53) - 1;

/// Field values of a dynamic record, keyed by field name.
pub type Record = BTreeMap<String, Value>;

/// A dynamically typed value fed into (or read out of) a record layout.
///
/// Integers are held as `i128` so every `Int*`/`Uint*` width, including the
/// full `u64` range, is represented without loss. Hashes, keys and
/// signatures travel as hex `Text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Integer(i128),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Record(Record),
}

impl Value {
    /// Short name of the variant, used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "string",
            Value::Bytes(_) => "byte array",
            Value::Record(_) => "record",
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(i128::from(v))
            }
        })*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl From<Hash> for Value {
    fn from(v: Hash) -> Self {
        Value::Text(v.to_hex())
    }
}

impl From<PublicKey> for Value {
    fn from(v: PublicKey) -> Self {
        Value::Text(v.to_hex())
    }
}

impl From<Signature> for Value {
    fn from(v: Signature) -> Self {
        Value::Text(v.to_hex())
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = EncodingError;

    /// JSON numbers become integers, arrays must be byte arrays (every
    /// element in `0..=255`), objects become nested records.
    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Err(EncodingError::InvalidValue {
                reason: "null is not a record value".to_string(),
            }),
            Json::Bool(b) => Ok(Value::Bool(b)),
            Json::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(Value::Integer(i128::from(v)))
                } else if let Some(v) = n.as_u64() {
                    Ok(Value::Integer(i128::from(v)))
                } else {
                    Err(EncodingError::InvalidValue {
                        reason: format!("{} is not an integer", n),
                    })
                }
            }
            Json::String(s) => Ok(Value::Text(s)),
            Json::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| EncodingError::InvalidValue {
                            reason: format!("array element {} is not a byte", item),
                        })
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Value::Bytes),
            Json::Object(map) => map
                .into_iter()
                .map(|(k, v)| Value::try_from(v).map(|v| (k, v)))
                .collect::<Result<Record, _>>()
                .map(Value::Record),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Past 2^53 a JSON number loses precision in JavaScript hosts.
            Value::Integer(v) if v.unsigned_abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*v as i64)
            }
            Value::Integer(v) => serializer.serialize_str(&v.to_string()),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                let mut seq = serializer.serialize_seq(Some(bytes.len()))?;
                for b in bytes {
                    seq.serialize_element(b)?;
                }
                seq.end()
            }
            Value::Record(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (k, v) in record {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::try_from(json).map_err(serde::de::Error::custom)
    }
}
