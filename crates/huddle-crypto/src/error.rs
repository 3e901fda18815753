//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from key handling.
///
/// Encryption, MAC and hashing never fail on well-typed inputs; the only
/// fallible step is turning untrusted bytes into fixed-size key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key material has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// IV material has the wrong length
    #[error("invalid iv length: expected {expected}, got {actual}")]
    InvalidIvLength {
        /// Expected IV length
        expected: usize,
        /// Actual IV length
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 31 };
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 31");
    }
}
