//! Observable state snapshots for invariant checking.

use std::collections::{BTreeMap, BTreeSet};

use huddle_core::{Identity, ReceivedMessage};

/// Observable state of the whole simulated room.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Current members.
    pub members: Vec<MemberSnapshot>,
    /// Every message handed to an engine for sending, in order.
    pub sent: Vec<SentMessage>,
    /// Every fingerprint each identity has ever owned.
    pub key_history: BTreeMap<Identity, BTreeSet<String>>,
}

/// Observable state of one member.
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    /// Member identity.
    pub identity: Identity,
    /// Fingerprint of the member's current key.
    pub own_fingerprint: String,
    /// Fingerprints the member holds for its peers.
    pub peer_fingerprints: BTreeMap<Identity, String>,
    /// Peers the member is established with.
    pub established: BTreeSet<Identity>,
    /// Every message the member delivered, in order.
    pub delivered: Vec<ReceivedMessage>,
}

/// A message as it left its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Sender.
    pub from: Identity,
    /// Plaintext.
    pub body: Vec<u8>,
    /// Identities listed in the envelope.
    pub recipients: BTreeSet<Identity>,
}
