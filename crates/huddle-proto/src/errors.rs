//! Errors from envelope encoding and decoding.

use thiserror::Error;

/// Result alias for wire operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Structural problems with an inbound envelope.
///
/// Every variant means the envelope is malformed and must be dropped. None of
/// them say anything about the sender's keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Envelope exceeds the maximum accepted size
    #[error("envelope too large: {size} bytes (max {max})")]
    EnvelopeTooLarge {
        /// Size of the rejected envelope
        size: usize,
        /// Maximum accepted size
        max: usize,
    },

    /// Not valid JSON, unknown `type`, or a required field is absent
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// A binary field is not valid standard base64
    #[error("invalid base64 in field `{field}`")]
    InvalidBase64 {
        /// Field that failed to decode
        field: &'static str,
    },

    /// A fixed-size binary field has the wrong length
    #[error("invalid length for `{field}`: expected {expected}, got {actual}")]
    InvalidLength {
        /// Field with the wrong length
        field: &'static str,
        /// Required length in bytes
        expected: usize,
        /// Decoded length in bytes
        actual: usize,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
