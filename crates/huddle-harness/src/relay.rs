//! In-memory broadcast relay.
//!
//! Stands in for the untrusted room server: every frame a member broadcasts is
//! fanned out to every member, the sender included. With a [`ChaosConfig`] the
//! relay also drops, corrupts and replays frames, all driven by one seeded RNG
//! so a failing run can be reproduced from its seed.
//!
//! # Invariants
//!
//! - Frames are relayed in FIFO order.
//! - A frame is replayed at most once.
//! - Only message envelopes are corrupted. Key announcements always arrive
//!   intact or not at all.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use huddle_client::SharedEngine;
use huddle_core::{EngineAction, EngineConfig, EngineError, Identity, ReceivedMessage};
use huddle_proto::Envelope;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    invariants::{MemberSnapshot, SentMessage, SystemSnapshot},
    sim_env::SeededEnv,
};

/// Frames processed by [`SimRelay::run_until_quiet`] before it gives up.
pub const MAX_RELAY_STEPS: usize = 100_000;

/// Probabilities of relay misbehaviour, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChaosConfig {
    /// Chance that one receiver never sees a frame
    pub drop_rate: f64,
    /// Chance that a message frame has one bit flipped before fan-out
    pub tamper_rate: f64,
    /// Chance that a frame is queued again after fan-out
    pub replay_rate: f64,
}

impl ChaosConfig {
    /// Well-behaved relay.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether every rate is zero.
    pub fn is_calm(&self) -> bool {
        self.drop_rate <= 0.0 && self.tamper_rate <= 0.0 && self.replay_rate <= 0.0
    }
}

/// One room member and everything it surfaced to its user.
pub struct SimMember {
    /// Engine handle
    pub engine: SharedEngine<SeededEnv>,
    /// Delivered messages, in order
    pub delivered: Vec<ReceivedMessage>,
    /// Envelopes the engine dropped
    pub rejected: usize,
    /// `KeyChanged` actions seen
    pub key_changes: usize,
    /// `Established` actions seen
    pub established: usize,
}

impl SimMember {
    fn new(engine: SharedEngine<SeededEnv>) -> Self {
        Self { engine, delivered: Vec::new(), rejected: 0, key_changes: 0, established: 0 }
    }

    fn apply(&mut self, actions: Vec<EngineAction>, outbox: &mut Vec<Vec<u8>>) {
        for action in actions {
            match action {
                EngineAction::Broadcast(outgoing) => outbox.push(outgoing.into_bytes()),
                EngineAction::Deliver(message) => self.delivered.push(message),
                EngineAction::KeyChanged { .. } => self.key_changes += 1,
                EngineAction::Established { .. } => self.established += 1,
            }
        }
    }
}

/// Counters for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Frames taken off the queue
    pub frames: usize,
    /// Frames handed to a receiving engine
    pub receptions: usize,
    /// Receptions skipped by chaos
    pub dropped: usize,
    /// Frames corrupted by chaos
    pub tampered: usize,
    /// Frames queued a second time by chaos
    pub replayed: usize,
    /// Receptions the engine rejected
    pub rejected: usize,
    /// Rejections classified as tampering
    pub tampering_detected: usize,
    /// Messages delivered across all members
    pub delivered: usize,
}

struct Frame {
    from: Identity,
    bytes: Vec<u8>,
    replayed: bool,
}

/// Seeded broadcast relay for a single room.
pub struct SimRelay {
    rng: ChaCha20Rng,
    chaos: ChaosConfig,
    members: BTreeMap<Identity, SimMember>,
    queue: VecDeque<Frame>,
    sent: Vec<SentMessage>,
    key_history: BTreeMap<Identity, BTreeSet<String>>,
    stats: RelayStats,
}

impl SimRelay {
    /// Empty room. `seed` drives both chaos and every member's keys.
    pub fn new(seed: u64, chaos: ChaosConfig) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            chaos,
            members: BTreeMap::new(),
            queue: VecDeque::new(),
            sent: Vec::new(),
            key_history: BTreeMap::new(),
            stats: RelayStats::default(),
        }
    }

    /// Add a member and queue its announcement.
    ///
    /// Returns `false` if `identity` is already in the room.
    pub fn add_member(&mut self, identity: impl Into<Identity>) -> bool {
        let identity = identity.into();
        if self.members.contains_key(&identity) {
            tracing::warn!(member = %identity, "already in room");
            return false;
        }
        self.start(identity);
        true
    }

    /// Restart a member with a fresh key pair, as a client that lost its
    /// storage would.
    ///
    /// Frames the old instance queued are discarded.
    pub fn rekey(&mut self, identity: &Identity) -> bool {
        if self.members.remove(identity).is_none() {
            return false;
        }
        self.queue.retain(|frame| frame.from != *identity);
        self.start(identity.clone());
        true
    }

    /// Remove a member. Every remaining engine forgets it.
    pub fn remove_member(&mut self, identity: &Identity) -> bool {
        if self.members.remove(identity).is_none() {
            return false;
        }
        self.queue.retain(|frame| frame.from != *identity);
        for member in self.members.values() {
            member.engine.destroy_peer(identity);
        }
        tracing::debug!(member = %identity, "member left");
        true
    }

    /// Encrypt `body` from `from` for every peer it holds a key for.
    ///
    /// Returns `Ok(false)` if `from` is not in the room.
    ///
    /// # Errors
    ///
    /// Whatever the sending engine reports.
    pub fn send(&mut self, from: &Identity, body: &[u8]) -> Result<bool, EngineError> {
        let Some(member) = self.members.get(from) else {
            return Ok(false);
        };

        let actions = member.engine.send(body, &BTreeSet::new())?;
        for outgoing in actions.iter().filter_map(EngineAction::as_broadcast) {
            if let Envelope::Message(message) = outgoing.envelope() {
                self.sent.push(SentMessage {
                    from: from.clone(),
                    body: body.to_vec(),
                    recipients: message.recipients.keys().cloned().collect(),
                });
            }
            self.queue.push_back(Frame {
                from: from.clone(),
                bytes: outgoing.as_bytes().to_vec(),
                replayed: false,
            });
        }
        Ok(true)
    }

    /// Relay up to `steps` frames. Returns how many were relayed.
    pub fn deliver(&mut self, steps: usize) -> usize {
        let mut relayed = 0;
        while relayed < steps {
            let Some(frame) = self.queue.pop_front() else {
                break;
            };
            self.relay(frame);
            relayed += 1;
        }
        relayed
    }

    /// Relay until the queue is empty.
    ///
    /// Returns `false` if [`MAX_RELAY_STEPS`] frames were relayed and the
    /// queue is still not empty.
    pub fn run_until_quiet(&mut self) -> bool {
        self.deliver(MAX_RELAY_STEPS);
        if self.queue.is_empty() {
            true
        } else {
            tracing::warn!(pending = self.queue.len(), "relay did not go quiet");
            false
        }
    }

    /// Change relay behaviour from the next frame on.
    pub fn set_chaos(&mut self, chaos: ChaosConfig) {
        self.chaos = chaos;
    }

    /// Members in identity order.
    pub fn members(&self) -> impl Iterator<Item = (&Identity, &SimMember)> {
        self.members.iter()
    }

    /// One member.
    pub fn member(&self, identity: &Identity) -> Option<&SimMember> {
        self.members.get(identity)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the room is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Frames waiting to be relayed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Messages handed to engines so far.
    pub fn sent(&self) -> &[SentMessage] {
        &self.sent
    }

    /// Counters so far.
    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Observable state of the room.
    pub fn snapshot(&self) -> SystemSnapshot {
        let members = self
            .members
            .iter()
            .map(|(identity, member)| {
                member.engine.with(|engine| {
                    let peers: Vec<Identity> = engine.peers().cloned().collect();
                    MemberSnapshot {
                        identity: identity.clone(),
                        own_fingerprint: engine.own_fingerprint(),
                        peer_fingerprints: peers
                            .iter()
                            .filter_map(|peer| Some((peer.clone(), engine.fingerprint(peer)?)))
                            .collect(),
                        established: peers
                            .iter()
                            .filter(|peer| engine.is_established(peer))
                            .cloned()
                            .collect(),
                        delivered: member.delivered.clone(),
                    }
                })
            })
            .collect();

        SystemSnapshot { members, sent: self.sent.clone(), key_history: self.key_history.clone() }
    }

    fn start(&mut self, identity: Identity) {
        let env = SeededEnv::new(self.rng.next_u64());
        let engine = SharedEngine::from_config(env, EngineConfig::new(identity.clone()));

        for (existing, member) in &self.members {
            member.engine.peer_joined(&identity);
            engine.peer_joined(existing);
        }

        self.key_history.entry(identity.clone()).or_default().insert(engine.own_fingerprint());

        let mut member = SimMember::new(engine.clone());
        let mut outbox = Vec::new();
        member.apply(engine.init(), &mut outbox);
        self.members.insert(identity.clone(), member);

        tracing::debug!(member = %identity, fingerprint = %engine.own_fingerprint(), "member joined");
        self.enqueue(&identity, outbox);
    }

    fn enqueue(&mut self, from: &Identity, outbox: Vec<Vec<u8>>) {
        self.queue.extend(
            outbox.into_iter().map(|bytes| Frame { from: from.clone(), bytes, replayed: false }),
        );
    }

    fn relay(&mut self, mut frame: Frame) {
        self.stats.frames += 1;

        if self.roll(self.chaos.tamper_rate) {
            if let Some(bytes) = self.tamper(&frame.bytes) {
                tracing::debug!(from = %frame.from, "relay corrupted frame");
                self.stats.tampered += 1;
                frame.bytes = bytes;
            }
        }

        let receivers: Vec<Identity> = self.members.keys().cloned().collect();
        for receiver in receivers {
            if self.roll(self.chaos.drop_rate) {
                self.stats.dropped += 1;
                continue;
            }
            let Some(member) = self.members.get_mut(&receiver) else {
                continue;
            };

            self.stats.receptions += 1;
            let mut outbox = Vec::new();
            match member.engine.receive(&frame.from, &frame.bytes) {
                Ok(actions) => {
                    let before = member.delivered.len();
                    member.apply(actions, &mut outbox);
                    self.stats.delivered += member.delivered.len() - before;
                },
                Err(err) => {
                    member.rejected += 1;
                    self.stats.rejected += 1;
                    if err.is_tampering() {
                        self.stats.tampering_detected += 1;
                    }
                },
            }
            self.enqueue(&receiver, outbox);
        }

        if !frame.replayed && self.roll(self.chaos.replay_rate) {
            self.stats.replayed += 1;
            frame.replayed = true;
            self.queue.push_back(frame);
        }
    }

    /// Flip one bit of a message envelope, either in a ciphertext or in the
    /// tag. `None` for anything else.
    fn tamper(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        let Ok(Envelope::Message(mut message)) = Envelope::decode(bytes) else {
            return None;
        };

        let bit = 1u8 << self.rng.gen_range(0..8);
        let slice = message
            .recipients
            .values_mut()
            .filter_map(|slice| slice.ciphertext.as_mut())
            .find(|ciphertext| !ciphertext.is_empty());

        match slice {
            Some(ciphertext) if self.rng.gen_bool(0.5) => {
                let index = self.rng.gen_range(0..ciphertext.len());
                ciphertext[index] ^= bit;
            },
            _ => {
                let index = self.rng.gen_range(0..message.tag.len());
                message.tag[index] ^= bit;
            },
        }
        Some(Envelope::Message(message).encode())
    }

    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.gen_bool(rate.min(1.0))
    }
}
