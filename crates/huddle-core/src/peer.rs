//! Per-peer key state.
//!
//! ```text
//!   Unknown { key_sent } ──key received──► KeyReceived ──our key sent──► Established
//!        │                                                                   ▲
//!        └──────────────key received (key_sent = true)───────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - Session keys exist iff a public key exists. Both live in the same enum
//!   variant, so one can never be present without the other.
//! - Storing a new public key always re-derives the session keys.
//! - Once established, a peer stays established until it is removed, even
//!   across key changes.

use std::collections::BTreeMap;

use huddle_crypto::{PublicKey, SessionKeys};
use huddle_proto::Identity;

/// Key state of one peer.
#[derive(Debug)]
pub enum PeerState {
    /// We have no key for this peer yet
    Unknown {
        /// Whether the peer has been sent our public key
        key_sent: bool,
    },
    /// We hold the peer's key but have not sent ours
    KeyReceived {
        /// Peer's announced key
        public_key: PublicKey,
        /// Keys derived from our private key and `public_key`
        session_keys: SessionKeys,
    },
    /// Both sides hold each other's key
    Established {
        /// Peer's announced key
        public_key: PublicKey,
        /// Keys derived from our private key and `public_key`
        session_keys: SessionKeys,
    },
}

impl PeerState {
    /// Peer's public key, if known.
    pub fn public_key(&self) -> Option<&PublicKey> {
        match self {
            Self::Unknown { .. } => None,
            Self::KeyReceived { public_key, .. } | Self::Established { public_key, .. } => {
                Some(public_key)
            },
        }
    }

    /// Session keys, if the peer's public key is known.
    pub fn session_keys(&self) -> Option<&SessionKeys> {
        match self {
            Self::Unknown { .. } => None,
            Self::KeyReceived { session_keys, .. } | Self::Established { session_keys, .. } => {
                Some(session_keys)
            },
        }
    }

    /// Whether key exchange completed in both directions.
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established { .. })
    }

    fn key_sent(&self) -> bool {
        match self {
            Self::Unknown { key_sent } => *key_sent,
            Self::KeyReceived { .. } => false,
            Self::Established { .. } => true,
        }
    }
}

/// Outcome of storing a peer's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    /// A different key was already stored
    pub changed: bool,
    /// The peer just became established
    pub established: bool,
}

/// All peers of one room, ordered by identity.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: BTreeMap<Identity, PeerState>,
}

impl PeerTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an `Unknown` entry unless one exists. Returns true if created.
    pub fn ensure(&mut self, identity: &Identity) -> bool {
        if self.peers.contains_key(identity) {
            return false;
        }
        self.peers.insert(identity.clone(), PeerState::Unknown { key_sent: false });
        true
    }

    /// State of one peer.
    pub fn get(&self, identity: &Identity) -> Option<&PeerState> {
        self.peers.get(identity)
    }

    /// Whether the peer has an entry.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.peers.contains_key(identity)
    }

    /// Drop a peer and its session keys (zeroized on drop).
    pub fn remove(&mut self, identity: &Identity) -> bool {
        self.peers.remove(identity).is_some()
    }

    /// Identities in sorted order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.peers.keys()
    }

    /// Peers with known keys, in sorted order.
    pub fn keyed(&self) -> impl Iterator<Item = (&Identity, &SessionKeys)> {
        self.peers.iter().filter_map(|(identity, state)| Some((identity, state.session_keys()?)))
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Store a peer's public key together with freshly derived session keys.
    ///
    /// Creates the entry if needed. The previous session keys, if any, are
    /// dropped and zeroized.
    pub fn store_key(
        &mut self,
        identity: &Identity,
        public_key: PublicKey,
        session_keys: SessionKeys,
    ) -> KeyTransition {
        let previous = self.peers.remove(identity);
        let changed = previous
            .as_ref()
            .and_then(PeerState::public_key)
            .is_some_and(|old| *old != public_key);
        let was_established = previous.as_ref().is_some_and(PeerState::is_established);
        let key_sent = previous.as_ref().is_some_and(PeerState::key_sent);
        drop(previous);

        let state = if key_sent {
            PeerState::Established { public_key, session_keys }
        } else {
            PeerState::KeyReceived { public_key, session_keys }
        };
        self.peers.insert(identity.clone(), state);

        KeyTransition { changed, established: key_sent && !was_established }
    }

    /// Record that our key reached `identity`. Returns true if the peer just
    /// became established.
    ///
    /// Unknown identities are ignored.
    pub fn mark_key_sent(&mut self, identity: &Identity) -> bool {
        let Some(state) = self.peers.get_mut(identity) else {
            return false;
        };

        let previous = std::mem::replace(state, PeerState::Unknown { key_sent: true });
        let (next, promoted) = match previous {
            PeerState::KeyReceived { public_key, session_keys } => {
                (PeerState::Established { public_key, session_keys }, true)
            },
            PeerState::Unknown { .. } => (PeerState::Unknown { key_sent: true }, false),
            established @ PeerState::Established { .. } => (established, false),
        };
        *state = next;
        promoted
    }

    /// Record that our key reached every current peer. Returns the peers that
    /// just became established, in sorted order.
    pub fn mark_all_key_sent(&mut self) -> Vec<Identity> {
        let identities: Vec<Identity> = self.peers.keys().cloned().collect();
        identities.into_iter().filter(|identity| self.mark_key_sent(identity)).collect()
    }
}
