//! Standard invariant checks.

use std::collections::BTreeSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A stored peer fingerprint must belong to a key that peer actually owned.
///
/// The relay never forges key announcements, so any other fingerprint means
/// the engine derived or stored a key incorrectly.
pub struct FingerprintHistory;

impl Invariant for FingerprintHistory {
    fn name(&self) -> &'static str {
        "fingerprint_history"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for member in &state.members {
            for (peer, fingerprint) in &member.peer_fingerprints {
                let owned = state.key_history.get(peer).is_some_and(|keys| keys.contains(fingerprint));
                if !owned {
                    return Err(Violation::new(
                        self.name(),
                        format!(
                            "{} holds fingerprint {} for {peer}, a key {peer} never announced",
                            member.identity,
                            fingerprint.get(..16).unwrap_or(fingerprint.as_str()),
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Every delivered message was sent by its claimed sender to this member.
pub struct DeliveryAuthenticity;

impl Invariant for DeliveryAuthenticity {
    fn name(&self) -> &'static str {
        "delivery_authenticity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for member in &state.members {
            for message in &member.delivered {
                let genuine = state.sent.iter().any(|sent| {
                    sent.from == message.from
                        && sent.body == message.body
                        && sent.recipients.contains(&member.identity)
                });
                if !genuine {
                    return Err(Violation::new(
                        self.name(),
                        format!(
                            "{} delivered {} bytes from {} that were never sent to it",
                            member.identity,
                            message.body.len(),
                            message.from
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// No member delivers the same message twice.
///
/// Relies on the simulation giving every message a unique body.
pub struct NoDuplicateDelivery;

impl Invariant for NoDuplicateDelivery {
    fn name(&self) -> &'static str {
        "no_duplicate_delivery"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for member in &state.members {
            let mut seen = BTreeSet::new();
            for message in &member.delivered {
                if !seen.insert((&message.from, &message.body)) {
                    return Err(Violation::new(
                        self.name(),
                        format!(
                            "{} delivered a message from {} twice",
                            member.identity, message.from
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A member never delivers a message from itself.
pub struct NoSelfDelivery;

impl Invariant for NoSelfDelivery {
    fn name(&self) -> &'static str {
        "no_self_delivery"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for member in &state.members {
            if member.delivered.iter().any(|message| message.from == member.identity) {
                return Err(Violation::new(
                    self.name(),
                    format!("{} delivered its own message", member.identity),
                ));
            }
        }
        Ok(())
    }
}
