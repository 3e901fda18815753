//! Peer identities and request targets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a peer within one room.
///
/// Unique inside a room, not stable across rooms. Ordering is byte-wise on
/// the UTF-8 string, which is the canonical recipient order on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Addressee of a public key request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every member should answer (encoded as the empty string)
    Broadcast,
    /// Only the named member should answer
    Peer(Identity),
}

impl Target {
    /// Wire form: empty string for broadcast.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Broadcast => "",
            Self::Peer(identity) => identity.as_str(),
        }
    }

    /// Parse the wire form. The empty string means broadcast.
    pub fn from_wire(value: &str) -> Self {
        if value.is_empty() { Self::Broadcast } else { Self::Peer(Identity::from(value)) }
    }

    /// Whether a member called `me` is asked to answer.
    pub fn addresses(&self, me: &Identity) -> bool {
        match self {
            Self::Broadcast => true,
            Self::Peer(identity) => identity == me,
        }
    }
}
