//! Engine inputs and outputs.
//!
//! The engine is driven by [`EngineEvent`]s and answers with
//! [`EngineAction`]s. It never performs I/O itself: broadcasting envelopes and
//! surfacing messages to the user is the caller's job.

use std::collections::BTreeSet;

use huddle_proto::{Envelope, Identity, Target};

/// Input to [`crate::ProtocolEngine::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Announce ourselves to the room
    Init,

    /// Encrypt a message for every keyed peer not in `exclude`
    Send {
        /// Message body
        plaintext: Vec<u8>,
        /// Peers that must not be able to read it
        exclude: BTreeSet<Identity>,
    },

    /// Encrypt a message for a single peer
    SendExclusive {
        /// Only recipient
        target: Identity,
        /// Message body
        plaintext: Vec<u8>,
    },

    /// Envelope received from the room
    Receive {
        /// Sender as reported by the transport
        sender: Identity,
        /// Raw envelope bytes
        bytes: Vec<u8>,
    },

    /// Ask one peer, or everyone, to announce their key
    RequestPublicKey {
        /// Who should answer
        target: Target,
    },

    /// Transport reports a new room member
    PeerJoined {
        /// New member
        identity: Identity,
    },

    /// Transport reports a member left
    PeerLeft {
        /// Departed member
        identity: Identity,
    },
}

/// Output of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Send this envelope to the whole room
    Broadcast(OutgoingEnvelope),

    /// Hand a decrypted message to the user
    Deliver(ReceivedMessage),

    /// A peer announced a key different from the one we stored
    KeyChanged {
        /// Peer whose key changed
        identity: Identity,
    },

    /// Key exchange with a peer completed in both directions
    Established {
        /// Newly established peer
        identity: Identity,
    },
}

/// An envelope ready for the wire.
///
/// Encoded once at construction so callers and tests see the exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEnvelope {
    envelope: Envelope,
    bytes: Vec<u8>,
}

impl OutgoingEnvelope {
    /// Encode `envelope`.
    pub fn new(envelope: Envelope) -> Self {
        let bytes = envelope.encode();
        Self { envelope, bytes }
    }

    /// Structured form.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A message that passed every integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Sender as reported by the transport
    pub from: Identity,
    /// Plaintext with padding removed
    pub body: Vec<u8>,
    /// Room members that could not read this message, sorted
    pub missing_recipients: Vec<Identity>,
}

impl EngineAction {
    /// The envelope, if this is a broadcast.
    pub fn as_broadcast(&self) -> Option<&OutgoingEnvelope> {
        match self {
            Self::Broadcast(outgoing) => Some(outgoing),
            _ => None,
        }
    }

    /// The message, if this is a delivery.
    pub fn as_delivery(&self) -> Option<&ReceivedMessage> {
        match self {
            Self::Deliver(message) => Some(message),
            _ => None,
        }
    }
}
