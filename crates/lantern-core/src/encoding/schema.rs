//! JSON descriptions of record and message layouts.
//!
//! A schema mirrors the descriptor shape callers already exchange:
//!
//! ```json
//! { "size": 40, "fields": {
//!     "pub_key": { "type": "PublicKey", "size": 32, "from": 0, "to": 32 },
//!     "name":    { "type": "String",    "size": 8,  "from": 32, "to": 40 } } }
//! ```
//!
//! A nested record puts a schema object in `type`. Message schemas add
//! `message_type` and `service_id` next to `size` and `fields`.

use super::error::EncodingError;
use super::field::Primitive;
use super::layout::{FieldDescriptor, FieldType, RecordType};
use super::message::MessageType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub size: usize,
    pub fields: BTreeMap<String, FieldSchema>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub ty: TypeSchema,
    pub size: usize,
    pub from: usize,
    pub to: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSchema {
    Primitive(Primitive),
    Record(Box<RecordSchema>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSchema {
    pub message_type: u16,
    pub service_id: u16,
    #[serde(flatten)]
    pub body: RecordSchema,
}

impl RecordSchema {
    /// Validate the schema into a layout; nested schemas are built first.
    pub fn build(&self) -> Result<RecordType, EncodingError> {
        let fields = self
            .fields
            .iter()
            .map(|(name, field)| {
                let ty = match &field.ty {
                    TypeSchema::Primitive(p) => FieldType::Primitive(*p),
                    TypeSchema::Record(nested) => FieldType::Record(Arc::new(
                        nested.build().map_err(|e| e.in_field(name))?,
                    )),
                };
                Ok((
                    name.clone(),
                    FieldDescriptor {
                        ty,
                        size: field.size,
                        from: field.from,
                        to: field.to,
                    },
                ))
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;
        RecordType::new(self.size, fields)
    }
}

impl MessageSchema {
    pub fn build(&self) -> Result<MessageType, EncodingError> {
        Ok(MessageType::new(
            self.body.build()?,
            self.message_type,
            self.service_id,
        ))
    }
}

/// Parse and validate a record layout from its JSON schema.
pub fn record_type_from_json(json: &str) -> Result<RecordType, EncodingError> {
    let schema: RecordSchema = serde_json::from_str(json).map_err(|e| EncodingError::InvalidLayout {
        reason: format!("schema JSON: {}", e),
    })?;
    schema.build()
}

/// Parse and validate a message layout from its JSON schema.
pub fn message_type_from_json(json: &str) -> Result<MessageType, EncodingError> {
    let schema: MessageSchema =
        serde_json::from_str(json).map_err(|e| EncodingError::InvalidLayout {
            reason: format!("schema JSON: {}", e),
        })?;
    schema.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_schema() {
        let ty = record_type_from_json(
            r#"{ "size": 40, "fields": {
                "pub_key": { "type": "PublicKey", "size": 32, "from": 0, "to": 32 },
                "name": { "type": "String", "size": 8, "from": 32, "to": 40 } } }"#,
        )
        .unwrap();
        assert_eq!(ty.size(), 40);
        assert!(!ty.is_fixed());
        assert_eq!(ty.field("name").unwrap().from, 32);
    }

    #[test]
    fn test_parse_nested_schema() {
        let ty = record_type_from_json(
            r#"{ "size": 12, "fields": {
                "id": { "type": "Uint32", "size": 4, "from": 0, "to": 4 },
                "point": { "type": { "size": 8, "fields": {
                    "x": { "type": "Int32", "size": 4, "from": 0, "to": 4 },
                    "y": { "type": "Int32", "size": 4, "from": 4, "to": 8 } } },
                  "size": 8, "from": 4, "to": 12 } } }"#,
        )
        .unwrap();
        assert!(ty.is_fixed());
        assert!(matches!(
            ty.field("point").unwrap().ty,
            FieldType::Record(_)
        ));
    }

    #[test]
    fn test_parse_message_schema() {
        let ty = message_type_from_json(
            r#"{ "message_type": 4, "service_id": 0, "size": 4, "fields": {
                "validator": { "type": "Uint32", "size": 4, "from": 0, "to": 4 } } }"#,
        )
        .unwrap();
        assert_eq!(ty.message_type(), 4);
        assert_eq!(ty.body().size(), 4);
    }

    #[test]
    fn test_inconsistent_descriptor_rejected() {
        let result = record_type_from_json(
            r#"{ "size": 8, "fields": {
                "a": { "type": "Uint64", "size": 8, "from": 0, "to": 4 } } }"#,
        );
        assert!(matches!(result, Err(EncodingError::InvalidLayout { .. })));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = record_type_from_json(
            r#"{ "size": 8, "fields": {
                "a": { "type": "Float64", "size": 8, "from": 0, "to": 8 } } }"#,
        );
        assert!(matches!(result, Err(EncodingError::InvalidLayout { .. })));
    }
}
