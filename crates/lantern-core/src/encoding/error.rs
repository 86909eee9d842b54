use crate::crypto::CryptoError;
use crate::types::primitives::HexError;
use thiserror::Error;

/// Errors raised while encoding or decoding records and messages.
///
/// Codec failures inside a record are wrapped in [`EncodingError::Field`] so
/// the message names the offending field, e.g.
/// `field "height": Value 300 out of range for Uint8`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("Segment [{from}, {to}) does not fit {kind}: expected {expected} bytes")]
    SegmentLength {
        kind: &'static str,
        from: usize,
        to: usize,
        expected: usize,
    },

    #[error("Segment ends at {to} but the buffer holds only {buffer_len} bytes")]
    SegmentOutOfBounds { to: usize, buffer_len: usize },

    #[error("Value {value} out of range for {kind}")]
    OutOfRange { kind: &'static str, value: String },

    #[error("{kind} expects {expected}, got {got}")]
    TypeMismatch {
        kind: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Invalid hex for {kind}: {source}")]
    InvalidHex {
        kind: &'static str,
        #[source]
        source: HexError,
    },

    #[error("Boolean byte must be 0 or 1, got {value}")]
    InvalidBoolByte { value: u8 },

    #[error("Unknown field {name:?}")]
    UnknownField { name: String },

    #[error("field {name:?}: {source}")]
    Field {
        name: String,
        #[source]
        source: Box<EncodingError>,
    },

    #[error("Invalid record layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("Invalid value: {reason}")]
    InvalidValue { reason: String },

    #[error("Offset or length {value} does not fit into a 32-bit segment")]
    BufferOverflow { value: usize },

    #[error("Buffer truncated: need {needed} bytes at offset {offset}, buffer holds {buffer_len}")]
    Truncated {
        offset: usize,
        needed: usize,
        buffer_len: usize,
    },

    #[error("String segment is not valid UTF-8: {reason}")]
    InvalidUtf8 { reason: String },

    #[error("Signing failed: {0}")]
    Signing(#[from] CryptoError),
}

impl EncodingError {
    /// Attach the name of the field being processed.
    pub fn in_field(self, name: &str) -> Self {
        EncodingError::Field {
            name: name.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all field context stripped.
    pub fn root_cause(&self) -> &EncodingError {
        match self {
            EncodingError::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
