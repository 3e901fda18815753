//! Client error types.

use huddle_core::{ConfigError, EngineError};
use thiserror::Error;

/// Errors from room-level operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No engine exists for this room
    #[error("not in room {room}")]
    UnknownRoom {
        /// Requested room name
        room: String,
    },

    /// Room was joined already
    #[error("already in room {room}")]
    RoomAlreadyJoined {
        /// Requested room name
        room: String,
    },

    /// Stored key material could not be used
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The room's engine rejected the operation
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ClientError {
    /// Returns true if the room's engine dropped a forged, modified or
    /// replayed envelope.
    pub fn is_tampering(&self) -> bool {
        matches!(self, Self::Engine(err) if err.is_tampering())
    }
}
