//! Property-based tests for the engine pipelines
//!
//! 1. **Delivery**: any plaintext sent to any subset of the room arrives
//!    intact at exactly that subset
//! 2. **Tamper evidence**: any single bit flip in the receiver's own slice is
//!    rejected as tampering
//! 3. **Robustness**: arbitrary bytes never panic `receive`

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use huddle_core::{
    EngineAction, EngineConfig, EngineError, Environment, Identity, ProtocolEngine,
};
use huddle_proto::Envelope;
use proptest::prelude::*;

#[derive(Clone)]
struct StreamEnv {
    seed: u64,
    block: Arc<AtomicU64>,
}

impl StreamEnv {
    fn new(seed: u64) -> Self {
        Self { seed, block: Arc::new(AtomicU64::new(0)) }
    }
}

impl Environment for StreamEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        for chunk in buffer.chunks_mut(64) {
            let mut input = [0u8; 16];
            input[..8].copy_from_slice(&self.seed.to_be_bytes());
            input[8..].copy_from_slice(&self.block.fetch_add(1, Ordering::Relaxed).to_be_bytes());
            let block = huddle_crypto::sha512(&input);
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
    }
}

const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// Every member learns every key through a full init exchange.
fn room(seed: u64) -> Vec<ProtocolEngine<StreamEnv>> {
    let mut room: Vec<_> = NAMES
        .iter()
        .zip(0u64..)
        .map(|(name, i)| ProtocolEngine::new(StreamEnv::new(seed * 16 + i), EngineConfig::new(*name)))
        .collect();

    for i in 0..room.len() {
        let sender = room[i].identity().clone();
        let mut queue: Vec<(Identity, Vec<u8>)> = room[i]
            .init()
            .into_iter()
            .filter_map(|action| match action {
                EngineAction::Broadcast(outgoing) => Some((sender.clone(), outgoing.into_bytes())),
                _ => None,
            })
            .collect();

        while let Some((from, bytes)) = queue.pop() {
            for member in &mut room {
                for action in member.receive(&from, &bytes).unwrap() {
                    if let EngineAction::Broadcast(outgoing) = action {
                        queue.push((member.identity().clone(), outgoing.into_bytes()));
                    }
                }
            }
        }
    }
    room
}

fn sealed(actions: &[EngineAction]) -> Vec<u8> {
    actions[0].as_broadcast().unwrap().as_bytes().to_vec()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_delivery_matches_recipient_set(
        seed in any::<u32>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..400),
        excluded in prop::collection::btree_set(1usize..NAMES.len(), 0..3),
    ) {
        let mut room = room(u64::from(seed));
        let exclude: BTreeSet<Identity> =
            excluded.iter().map(|i| Identity::from(NAMES[*i])).collect();

        let bytes = sealed(&room[0].send(&plaintext, &exclude).unwrap());

        for (i, member) in room.iter_mut().enumerate().skip(1) {
            let result = member.receive(&Identity::from("alice"), &bytes);
            if excluded.contains(&i) {
                prop_assert_eq!(result, Err(EngineError::NoRecipientEntry));
            } else {
                let actions = result.unwrap();
                let message = actions[0].as_delivery().unwrap();
                prop_assert_eq!(&message.body, &plaintext);
                let mut missing: Vec<Identity> = message.missing_recipients.clone();
                missing.sort();
                prop_assert_eq!(missing, exclude.iter().cloned().collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn prop_bit_flip_in_own_slice_rejected(
        seed in any::<u32>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..100),
        field in 0usize..3,
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut room = room(u64::from(seed));
        let bytes = sealed(&room[0].send(&plaintext, &BTreeSet::new()).unwrap());

        let Ok(Envelope::Message(mut message)) = Envelope::decode(&bytes) else {
            panic!("expected message");
        };
        let slice = message.recipients.get_mut(&Identity::from("bob")).unwrap();
        let target: &mut [u8] = match field {
            0 => slice.ciphertext.as_mut().unwrap(),
            1 => slice.iv.as_mut().unwrap(),
            _ => slice.mac.as_mut().unwrap(),
        };
        let position = index.index(target.len());
        target[position] ^= 1 << bit;

        let result = room[1].receive(&Identity::from("alice"), &Envelope::Message(message).encode());
        prop_assert!(result.as_ref().is_err_and(EngineError::is_tampering), "{:?}", result);
    }

    #[test]
    fn prop_receive_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut room = room(7);
        let _ = room[1].receive(&Identity::from("alice"), &bytes);
    }
}
