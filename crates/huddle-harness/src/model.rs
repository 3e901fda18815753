//! Operations for model-based testing.
//!
//! Operations are generated from fuzzer or proptest bytes and applied to a
//! [`SimRelay`]. Member indices wrap around the current room, so every
//! generated sequence is applicable.

use arbitrary::Arbitrary;
use huddle_core::Identity;

use crate::relay::SimRelay;

/// Most members a generated sequence can add.
pub const MAX_MEMBERS: usize = 8;

/// Operations that can be applied to a room.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// A member sends a message to everyone it holds a key for.
    Send {
        /// Sender index, wrapped to the room size
        from: u8,
        /// Body length class
        size: u8,
    },

    /// Relay some queued frames.
    Deliver {
        /// Frames to relay
        steps: u8,
    },

    /// A member restarts with a new key pair.
    Rekey {
        /// Member index
        member: u8,
    },

    /// A new member joins.
    Join,

    /// A member leaves.
    Leave {
        /// Member index
        member: u8,
    },
}

impl SimRelay {
    /// Apply one operation. Operations that do not fit the current room, such
    /// as a send into an empty room, do nothing.
    pub fn apply(&mut self, operation: &Operation) {
        match *operation {
            Operation::Send { from, size } => {
                let Some(from) = self.member_at(from) else {
                    return;
                };
                let body = message_body(&from, self.sent().len(), size);
                if let Err(err) = self.send(&from, &body) {
                    tracing::warn!(member = %from, error = %err, "send failed");
                }
            },
            Operation::Deliver { steps } => {
                self.deliver(usize::from(steps));
            },
            Operation::Rekey { member } => {
                if let Some(identity) = self.member_at(member) {
                    self.rekey(&identity);
                }
            },
            Operation::Join => {
                if self.len() < MAX_MEMBERS {
                    let identity = (0u32..)
                        .map(|n| Identity::new(format!("member-{n}")))
                        .find(|identity| self.member(identity).is_none());
                    if let Some(identity) = identity {
                        self.add_member(identity);
                    }
                }
            },
            Operation::Leave { member } => {
                if let Some(identity) = self.member_at(member) {
                    self.remove_member(&identity);
                }
            },
        }
    }

    fn member_at(&self, index: u8) -> Option<Identity> {
        if self.is_empty() {
            return None;
        }
        let index = usize::from(index) % self.len();
        self.members().nth(index).map(|(identity, _)| identity.clone())
    }
}

/// Unique body for the `sequence`-th message of a run.
///
/// The prefix keeps every body distinct, the size class pads it out.
pub fn message_body(from: &Identity, sequence: usize, size: u8) -> Vec<u8> {
    let len = match size % 4 {
        0 => 0,
        1 => 16,
        2 => 200,
        _ => 2000,
    };

    let mut body = format!("{from}#{sequence}:").into_bytes();
    body.extend((0..len).map(|i| (sequence + i) as u8));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::ChaosConfig;

    #[test]
    fn bodies_are_unique_per_sequence() {
        let alice = Identity::from("alice");
        assert_ne!(message_body(&alice, 1, 0), message_body(&alice, 2, 0));
        assert_ne!(message_body(&alice, 1, 3), message_body(&Identity::from("bob"), 1, 3));
    }

    #[test]
    fn operations_on_empty_room_are_noops() {
        let mut relay = SimRelay::new(1, ChaosConfig::none());
        relay.apply(&Operation::Send { from: 3, size: 1 });
        relay.apply(&Operation::Rekey { member: 0 });
        relay.apply(&Operation::Leave { member: 0 });
        relay.apply(&Operation::Deliver { steps: 10 });
        assert!(relay.is_empty());
        assert!(relay.sent().is_empty());
    }

    #[test]
    fn join_picks_fresh_names() {
        let mut relay = SimRelay::new(1, ChaosConfig::none());
        relay.apply(&Operation::Join);
        relay.apply(&Operation::Join);
        relay.apply(&Operation::Leave { member: 0 });
        relay.apply(&Operation::Join);

        let names: Vec<_> = relay.members().map(|(identity, _)| identity.to_string()).collect();
        assert_eq!(names, ["member-0", "member-1"]);
    }
}
