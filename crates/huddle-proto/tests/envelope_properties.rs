//! Property-based tests for envelope encoding
//!
//! 1. **Determinism**: encoding the same envelope twice yields the same bytes
//! 2. **Round-trip**: decode(encode(e)) == e for arbitrary messages
//! 3. **Robustness**: arbitrary bytes never panic the decoder

use std::collections::BTreeMap;

use huddle_proto::{Envelope, Identity, MulticastMessage, RecipientSlice};
use proptest::prelude::*;

fn arbitrary_slice() -> impl Strategy<Value = RecipientSlice> {
    (
        prop::option::of(prop::collection::vec(any::<u8>(), 1..200)),
        prop::option::of(prop::array::uniform16(any::<u8>())),
        prop::option::of(prop::collection::vec(any::<u8>(), 64..=64)),
    )
        .prop_map(|(ciphertext, iv, mac)| RecipientSlice {
            ciphertext,
            iv,
            mac: mac.map(|bytes| {
                let mut out = [0u8; 64];
                out.copy_from_slice(&bytes);
                out
            }),
        })
}

fn arbitrary_message() -> impl Strategy<Value = Envelope> {
    (
        prop::collection::btree_map("[a-z]{1,8}", arbitrary_slice(), 0..6),
        prop::collection::vec(any::<u8>(), 64..=64),
    )
        .prop_map(|(recipients, tag)| {
            let recipients: BTreeMap<Identity, RecipientSlice> =
                recipients.into_iter().map(|(name, slice)| (Identity::from(name), slice)).collect();
            let mut fixed = [0u8; 64];
            fixed.copy_from_slice(&tag);
            Envelope::Message(MulticastMessage { recipients, tag: fixed })
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_encoding_is_deterministic(envelope in arbitrary_message()) {
        prop_assert_eq!(envelope.encode(), envelope.clone().encode());
    }

    #[test]
    fn prop_message_roundtrip(envelope in arbitrary_message()) {
        let decoded = Envelope::decode(&envelope.encode());
        prop_assert_eq!(decoded, Ok(envelope));
    }

    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Envelope::decode(&bytes);
    }
}
