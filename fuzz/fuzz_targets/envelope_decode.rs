//! Fuzz target for Envelope::decode
//!
//! Arbitrary bytes must never panic the decoder. Anything that does decode
//! must survive a re-encode unchanged.

#![no_main]

use huddle_proto::Envelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = Envelope::decode(data) else {
        return;
    };

    let reencoded = envelope.encode();
    assert_eq!(Envelope::decode(&reencoded).ok(), Some(envelope));
});
