//! Byte-exact record encoding.
//!
//! `field` is the primitive codec, `layout` composes fields into fixed or
//! fixed-plus-heap records, `message` wraps a record in the signed
//! `[header][body][signature]` envelope, and `schema` builds layouts from
//! their JSON description.

pub mod error;
pub mod field;
pub mod layout;
pub mod message;
pub mod schema;
pub mod value;

pub use error::EncodingError;
pub use field::Primitive;
pub use layout::{deserialize_from, serialize_into, FieldDescriptor, FieldType, RecordType};
pub use message::{header_type, serialize_message, MessageType};
pub use schema::{message_type_from_json, record_type_from_json, MessageSchema, RecordSchema};
pub use value::{Record, Value};
