//! Error types for the Huddle engine.
//!
//! Inbound errors never poison the engine. Each one means a single envelope
//! was dropped; session state is left as it was before the envelope arrived
//! (the replay ledger being the only exception, see [`EngineError::TagMismatch`]).

use huddle_proto::{Identity, ProtocolError};
use thiserror::Error;

/// Errors returned by [`crate::ProtocolEngine`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Envelope failed structural decoding
    #[error("parse error: {0}")]
    Parse(#[from] ProtocolError),

    /// Announced public key has the wrong length
    #[error("invalid public key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Length that was received
        actual: usize,
    },

    /// Message from an identity the engine has never heard of
    #[error("unknown peer: {identity}")]
    UnknownPeer {
        /// Sender that was not in the peer table
        identity: Identity,
    },

    /// Message carries no complete slice addressed to us
    #[error("no recipient entry for us")]
    NoRecipientEntry,

    /// Our MAC over the bundle did not verify
    #[error("authentication failed for message from {sender}")]
    AuthenticationFailed {
        /// Claimed sender
        sender: Identity,
    },

    /// Our IV was already seen
    #[error("replayed message from {sender}")]
    ReplayDetected {
        /// Claimed sender
        sender: Identity,
    },

    /// Global tag did not match the decrypted plaintext and MACs.
    ///
    /// The IV is already recorded at this point, so the same slice cannot be
    /// retried.
    #[error("tag mismatch for message from {sender}")]
    TagMismatch {
        /// Claimed sender
        sender: Identity,
    },

    /// Decrypted plaintext is shorter than the padding
    #[error("truncated message from {sender}: {length} bytes")]
    Truncated {
        /// Claimed sender
        sender: Identity,
        /// Length of the decrypted framed message
        length: usize,
    },

    /// Could not draw an unused IV
    #[error("randomness exhausted after {attempts} IV draws")]
    RandomnessExhausted {
        /// Number of draws attempted
        attempts: usize,
    },
}

impl EngineError {
    /// Returns true if the engine can no longer be used.
    ///
    /// Always false: every failure drops exactly one envelope.
    pub fn is_fatal(&self) -> bool {
        false
    }

    /// Returns true if the error indicates a forged, modified or replayed
    /// message rather than a benign protocol race.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::ReplayDetected { .. }
                | Self::TagMismatch { .. }
                | Self::Truncated { .. }
        )
    }
}

/// Errors building an [`crate::EngineConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored private key is not valid standard base64
    #[error("private key is not valid base64")]
    InvalidBase64,

    /// Stored private key has the wrong length
    #[error("invalid private key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Decoded length
        actual: usize,
    },
}
