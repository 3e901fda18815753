//! Group encryption engine for one room.
//!
//! Pure state machine: events in, actions out. It owns our key pair, the
//! per-peer key table and the replay ledger, and never performs I/O.
//!
//! # Sending
//!
//! ```text
//! framed = plaintext ‖ 64 random bytes
//! for each keyed peer r (sorted, minus exclusions):
//!     iv_r = 12 random ‖ 0000          (unique in the replay ledger)
//!     ct_r = AES-256-CTR(message_key_r, iv_r, framed)
//! bundle = ct_1 ‖ iv_1 ‖ ct_2 ‖ iv_2 ‖ ...
//! mac_r  = HMAC-SHA-512(mac_key_r, bundle)
//! tag    = SHA-512^8(framed ‖ mac_1 ‖ mac_2 ‖ ...)
//! ```
//!
//! # Receiving
//!
//! Checks run in a fixed order and the first failure drops the envelope:
//! own slice present, sender known, sender keyed, own MAC over the bundle of
//! complete slices, IV unseen, tag over the decrypted plaintext, padding
//! present.
//!
//! # Invariants
//!
//! - The replay ledger only grows. An incoming IV is recorded after its MAC
//!   verifies and before its ciphertext is decrypted.
//! - Envelopes claiming to come from our own identity are ignored.
//! - `Established` is reported once per peer per transition.
//!
//! # Security
//!
//! - MAC and tag comparisons are constant time.
//! - Framed plaintexts are zeroized once they leave scope.
//! - Secret material never reaches the log.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use huddle_crypto::{
    IV_RANDOM_SIZE, IV_SIZE, Iv, KeyPair, Mac, PUBLIC_KEY_SIZE, PublicKey, SessionKeys, Tag,
    apply_keystream, compute_mac, fingerprint, message_tag, verify_mac,
};
use huddle_proto::{
    Envelope, Identity, KeyAnnouncement, KeyRequest, MulticastMessage, RecipientSlice, Target,
};
use zeroize::Zeroize;

use crate::{
    config::EngineConfig,
    env::Environment,
    error::EngineError,
    event::{EngineAction, EngineEvent, OutgoingEnvelope, ReceivedMessage},
    peer::{PeerState, PeerTable},
    replay::ReplayGuard,
};

/// Random bytes appended to every plaintext before encryption
pub const PADDING_SIZE: usize = 64;

/// IV draws per recipient before giving up on the environment
const MAX_IV_ATTEMPTS: usize = 64;

/// Encryption engine for one room.
pub struct ProtocolEngine<E: Environment> {
    env: E,
    identity: Identity,
    keypair: KeyPair,
    peers: PeerTable,
    replay: ReplayGuard,
}

impl<E: Environment> ProtocolEngine<E> {
    /// Create an engine, generating a key pair from `env` unless `config`
    /// carries one.
    pub fn new(env: E, mut config: EngineConfig) -> Self {
        let mut secret = config.take_private_key().unwrap_or_else(|| env.random_array());
        let keypair = KeyPair::from_secret_bytes(secret);
        secret.zeroize();

        Self {
            identity: config.identity.clone(),
            env,
            keypair,
            peers: PeerTable::new(),
            replay: ReplayGuard::new(),
        }
    }

    /// Process one event.
    pub fn handle(&mut self, event: EngineEvent) -> Result<Vec<EngineAction>, EngineError> {
        match event {
            EngineEvent::Init => Ok(self.init()),
            EngineEvent::Send { plaintext, exclude } => self.send(&plaintext, &exclude),
            EngineEvent::SendExclusive { target, plaintext } => {
                self.send_exclusive(&target, &plaintext)
            },
            EngineEvent::Receive { sender, bytes } => self.receive(&sender, &bytes),
            EngineEvent::RequestPublicKey { target } => Ok(self.request_public_key(target)),
            EngineEvent::PeerJoined { identity } => {
                self.peer_joined(&identity);
                Ok(Vec::new())
            },
            EngineEvent::PeerLeft { identity } => {
                self.destroy_peer(&identity);
                Ok(Vec::new())
            },
        }
    }

    /// Announce ourselves: a broadcast key request followed by our key.
    ///
    /// Every peer already in the table counts as having received our key.
    pub fn init(&mut self) -> Vec<EngineAction> {
        tracing::debug!(identity = %self.identity, peers = self.peers.len(), "announcing public key");

        let mut actions = vec![Self::key_request(Target::Broadcast), self.announcement()];
        actions.extend(
            self.peers
                .mark_all_key_sent()
                .into_iter()
                .map(|identity| EngineAction::Established { identity }),
        );
        actions
    }

    /// Ask `target` (or everyone) to announce their key.
    pub fn request_public_key(&self, target: Target) -> Vec<EngineAction> {
        vec![Self::key_request(target)]
    }

    /// Encrypt `plaintext` for every keyed peer not in `exclude`.
    ///
    /// # Errors
    ///
    /// - `RandomnessExhausted` if the environment keeps producing IVs that are
    ///   already in the ledger
    pub fn send(
        &mut self,
        plaintext: &[u8],
        exclude: &BTreeSet<Identity>,
    ) -> Result<Vec<EngineAction>, EngineError> {
        self.seal(plaintext, |identity| !exclude.contains(identity))
    }

    /// Encrypt `plaintext` for `target` only.
    pub fn send_exclusive(
        &mut self,
        target: &Identity,
        plaintext: &[u8],
    ) -> Result<Vec<EngineAction>, EngineError> {
        self.seal(plaintext, |identity| identity == target)
    }

    /// Encrypt `plaintext` for the keyed peers accepted by `predicate`.
    pub fn send_matching(
        &mut self,
        plaintext: &[u8],
        predicate: impl Fn(&Identity) -> bool,
    ) -> Result<Vec<EngineAction>, EngineError> {
        self.seal(plaintext, predicate)
    }

    /// Process an envelope from `sender`.
    ///
    /// `sender` comes from the transport and is trusted for routing only;
    /// message authenticity rests on the MAC.
    ///
    /// # Errors
    ///
    /// Any error means the envelope was dropped. See [`EngineError`].
    pub fn receive(
        &mut self,
        sender: &Identity,
        bytes: &[u8],
    ) -> Result<Vec<EngineAction>, EngineError> {
        let result = self.receive_envelope(sender, bytes);
        if let Err(err) = &result {
            tracing::warn!(sender = %sender, error = %err, "dropped inbound envelope");
        }
        result
    }

    /// Record a room member reported by the transport.
    pub fn peer_joined(&mut self, identity: &Identity) {
        if *identity != self.identity && self.peers.ensure(identity) {
            tracing::debug!(peer = %identity, "peer joined");
        }
    }

    /// Forget a peer and its session keys. Idempotent.
    pub fn destroy_peer(&mut self, identity: &Identity) {
        if self.peers.remove(identity) {
            tracing::debug!(peer = %identity, "peer destroyed");
        }
    }

    /// Fingerprint of a peer's public key, if known.
    pub fn fingerprint(&self, identity: &Identity) -> Option<String> {
        let public_key = self.peers.get(identity)?.public_key()?;
        Some(fingerprint(public_key.as_bytes()))
    }

    /// Fingerprint of our own public key.
    pub fn own_fingerprint(&self) -> String {
        fingerprint(self.keypair.public_key().as_bytes())
    }

    /// Our identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Our public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Private key in standard base64, for the storage layer.
    pub fn export_private_key(&self) -> String {
        let mut secret = self.keypair.secret_bytes();
        let encoded = STANDARD.encode(secret);
        secret.zeroize();
        encoded
    }

    /// Known peers in sorted order.
    pub fn peers(&self) -> impl Iterator<Item = &Identity> {
        self.peers.identities()
    }

    /// Key state of one peer.
    pub fn peer_state(&self, identity: &Identity) -> Option<&PeerState> {
        self.peers.get(identity)
    }

    /// Whether key exchange with `identity` completed in both directions.
    pub fn is_established(&self, identity: &Identity) -> bool {
        self.peers.get(identity).is_some_and(PeerState::is_established)
    }

    fn seal(
        &mut self,
        plaintext: &[u8],
        include: impl Fn(&Identity) -> bool,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let Self { env, identity: own, peers, replay, .. } = self;

        let mut framed = Vec::with_capacity(plaintext.len() + PADDING_SIZE);
        framed.extend_from_slice(plaintext);
        framed.extend_from_slice(&env.random_array::<PADDING_SIZE>());

        let mut sealed: Vec<(&Identity, &SessionKeys, Vec<u8>, Iv)> = Vec::new();
        for (identity, keys) in peers.keyed().filter(|(identity, _)| include(*identity)) {
            let iv = fresh_iv(env, replay)?;
            let ciphertext = apply_keystream(keys.message_key(), &iv, &framed);
            sealed.push((identity, keys, ciphertext, iv));
        }

        let bundle = bundle(
            sealed.iter().map(|(_, _, ciphertext, iv)| (ciphertext.as_slice(), iv.as_bytes())),
        );
        let macs: Vec<Mac> =
            sealed.iter().map(|(_, keys, _, _)| compute_mac(keys.mac_key(), &bundle)).collect();
        let tag = message_tag(&framed, &macs);
        framed.zeroize();

        let recipients = sealed
            .into_iter()
            .zip(&macs)
            .map(|((identity, _, ciphertext, iv), mac)| {
                (identity.clone(), RecipientSlice::new(ciphertext, *iv.as_bytes(), mac.0))
            })
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(sender = %own, recipients = recipients.len(), "sealed message");

        let envelope = Envelope::Message(MulticastMessage { recipients, tag: tag.0 });
        Ok(vec![EngineAction::Broadcast(OutgoingEnvelope::new(envelope))])
    }

    fn receive_envelope(
        &mut self,
        sender: &Identity,
        bytes: &[u8],
    ) -> Result<Vec<EngineAction>, EngineError> {
        let envelope = Envelope::decode(bytes)?;

        if *sender == self.identity {
            tracing::trace!(kind = envelope.kind(), "ignoring own envelope");
            return Ok(Vec::new());
        }

        match envelope {
            Envelope::PublicKey(announcement) => self.receive_public_key(sender, &announcement.key),
            Envelope::PublicKeyRequest(request) => {
                Ok(self.receive_key_request(sender, &request.target))
            },
            Envelope::Message(message) => self.receive_message(sender, &message),
        }
    }

    fn receive_public_key(
        &mut self,
        sender: &Identity,
        key: &[u8],
    ) -> Result<Vec<EngineAction>, EngineError> {
        let public_key = PublicKey::try_from_slice(key).map_err(|_| {
            EngineError::InvalidKeyLength { expected: PUBLIC_KEY_SIZE, actual: key.len() }
        })?;

        let session_keys = SessionKeys::agree(&self.keypair, &public_key);
        let transition = self.peers.store_key(sender, public_key, session_keys);

        let mut actions = Vec::new();
        if transition.changed {
            tracing::warn!(peer = %sender, "public key changed");
            actions.push(EngineAction::KeyChanged { identity: sender.clone() });
        }
        if transition.established {
            tracing::debug!(peer = %sender, "session established");
            actions.push(EngineAction::Established { identity: sender.clone() });
        }
        Ok(actions)
    }

    fn receive_key_request(&mut self, sender: &Identity, target: &Target) -> Vec<EngineAction> {
        self.peers.ensure(sender);

        if !target.addresses(&self.identity) {
            return Vec::new();
        }

        tracing::debug!(peer = %sender, "answering key request");
        let mut actions = vec![self.announcement()];
        if self.peers.mark_key_sent(sender) {
            tracing::debug!(peer = %sender, "session established");
            actions.push(EngineAction::Established { identity: sender.clone() });
        }
        actions
    }

    fn receive_message(
        &mut self,
        sender: &Identity,
        message: &MulticastMessage,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let Some((ciphertext, iv, mac)) =
            message.recipients.get(&self.identity).and_then(RecipientSlice::parts)
        else {
            return Err(EngineError::NoRecipientEntry);
        };

        let Some(state) = self.peers.get(sender) else {
            return Err(EngineError::UnknownPeer { identity: sender.clone() });
        };

        let Some(keys) = state.session_keys() else {
            tracing::debug!(peer = %sender, "message from peer without key, requesting it");
            return Ok(vec![Self::key_request(Target::Peer(sender.clone()))]);
        };

        let missing_recipients = self.missing_recipients(sender, message);

        let bundle = bundle(
            message
                .recipients
                .values()
                .filter_map(RecipientSlice::parts)
                .map(|(ciphertext, iv, _)| (ciphertext, iv)),
        );
        if !verify_mac(keys.mac_key(), &bundle, &Mac(*mac)) {
            return Err(EngineError::AuthenticationFailed { sender: sender.clone() });
        }

        if !self.replay.insert(*iv) {
            return Err(EngineError::ReplayDetected { sender: sender.clone() });
        }

        let mut framed = apply_keystream(keys.message_key(), &Iv::from_bytes(*iv), ciphertext);

        let macs: Vec<Mac> = message.recipients.values().filter_map(|slice| slice.mac).map(Mac).collect();
        if message_tag(&framed, &macs) != Tag(message.tag) {
            framed.zeroize();
            return Err(EngineError::TagMismatch { sender: sender.clone() });
        }

        if framed.len() < PADDING_SIZE {
            let length = framed.len();
            framed.zeroize();
            return Err(EngineError::Truncated { sender: sender.clone(), length });
        }
        framed.truncate(framed.len() - PADDING_SIZE);

        tracing::debug!(
            sender = %sender,
            bytes = framed.len(),
            missing = missing_recipients.len(),
            "delivering message"
        );

        Ok(vec![EngineAction::Deliver(ReceivedMessage {
            from: sender.clone(),
            body: framed,
            missing_recipients,
        })])
    }

    /// Listed-but-incomplete recipients plus known peers the sender left out.
    fn missing_recipients(&self, sender: &Identity, message: &MulticastMessage) -> Vec<Identity> {
        let mut missing: BTreeSet<Identity> = message
            .recipients
            .iter()
            .filter(|(_, slice)| !slice.is_complete())
            .map(|(identity, _)| identity.clone())
            .collect();

        missing.extend(
            self.peers
                .identities()
                .filter(|identity| *identity != sender && !message.recipients.contains_key(*identity))
                .cloned(),
        );

        missing.into_iter().collect()
    }

    fn announcement(&self) -> EngineAction {
        let key = self.keypair.public_key().as_bytes().to_vec();
        EngineAction::Broadcast(OutgoingEnvelope::new(Envelope::PublicKey(KeyAnnouncement { key })))
    }

    fn key_request(target: Target) -> EngineAction {
        EngineAction::Broadcast(OutgoingEnvelope::new(Envelope::PublicKeyRequest(KeyRequest {
            target,
        })))
    }
}

impl<E: Environment> fmt::Debug for ProtocolEngine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("identity", &self.identity)
            .field("public_key", &self.keypair.public_key())
            .field("peers", &self.peers.len())
            .field("seen_ivs", &self.replay.len())
            .finish_non_exhaustive()
    }
}

/// Draw an IV that is not yet in the ledger and record it.
fn fresh_iv<E: Environment>(env: &E, replay: &mut ReplayGuard) -> Result<Iv, EngineError> {
    for _ in 0..MAX_IV_ATTEMPTS {
        let iv = Iv::from_random(env.random_array::<IV_RANDOM_SIZE>());
        if replay.insert(*iv.as_bytes()) {
            return Ok(iv);
        }
    }
    Err(EngineError::RandomnessExhausted { attempts: MAX_IV_ATTEMPTS })
}

/// Concatenate `ciphertext ‖ iv` for each slice, in the order given.
fn bundle<'a>(slices: impl IntoIterator<Item = (&'a [u8], &'a [u8; IV_SIZE])>) -> Vec<u8> {
    let mut out = Vec::new();
    for (ciphertext, iv) in slices {
        out.extend_from_slice(ciphertext);
        out.extend_from_slice(iv);
    }
    out
}
