//! Scripted room runs.
//!
//! A scenario joins `members` members one by one, lets them exchange keys,
//! then has them take turns sending `messages` messages while the relay
//! trickles frames through. The run ends by draining the relay and checking
//! every standard invariant.

use huddle_core::Identity;

use crate::{
    invariants::{InvariantRegistry, SystemSnapshot, Violation},
    model::message_body,
    relay::{ChaosConfig, RelayStats, SimRelay},
};

/// Frames relayed between two scripted sends.
const FRAMES_PER_SEND: usize = 3;

/// Parameters of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    /// Room size
    pub members: usize,
    /// Messages sent in total, round robin across members
    pub messages: usize,
    /// Seed for keys, padding, IVs and chaos
    pub seed: u64,
    /// Relay misbehaviour
    pub chaos: ChaosConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { members: 4, messages: 32, seed: 0, chaos: ChaosConfig::none() }
    }
}

/// Outcome of a run that upheld every invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimReport {
    /// Relay counters
    pub stats: RelayStats,
    /// Messages handed to engines
    pub sent: usize,
    /// Deliveries owed to current members that never happened
    pub undelivered: usize,
    /// Member pairs where both sides are established
    pub established_pairs: usize,
}

/// Run a scenario.
///
/// # Errors
///
/// Every invariant violation found in the final state.
pub fn run(config: &SimConfig) -> Result<SimReport, Vec<Violation>> {
    let mut relay = SimRelay::new(config.seed, config.chaos);

    let identities: Vec<Identity> =
        (0..config.members).map(|n| Identity::new(format!("member-{n}"))).collect();
    for identity in &identities {
        relay.add_member(identity.clone());
        relay.run_until_quiet();
    }

    for sequence in 0..config.messages {
        let Some(from) = identities.get(sequence % identities.len().max(1)) else {
            break;
        };
        let body = message_body(from, sequence, sequence as u8);
        if let Err(err) = relay.send(from, &body) {
            tracing::warn!(member = %from, error = %err, "send failed");
        }
        relay.deliver(FRAMES_PER_SEND);
    }
    relay.run_until_quiet();

    let snapshot = relay.snapshot();
    InvariantRegistry::standard().check_all(&snapshot)?;

    let report = SimReport {
        stats: relay.stats(),
        sent: snapshot.sent.len(),
        undelivered: undelivered(&snapshot),
        established_pairs: established_pairs(&snapshot),
    };
    tracing::info!(
        seed = config.seed,
        sent = report.sent,
        delivered = report.stats.delivered,
        undelivered = report.undelivered,
        rejected = report.stats.rejected,
        tampering = report.stats.tampering_detected,
        "scenario finished"
    );
    Ok(report)
}

fn undelivered(snapshot: &SystemSnapshot) -> usize {
    snapshot
        .sent
        .iter()
        .flat_map(|sent| sent.recipients.iter().map(move |recipient| (sent, recipient)))
        .filter(|(sent, recipient)| {
            snapshot.members.iter().find(|member| member.identity == **recipient).is_some_and(
                |member| {
                    !member.delivered.iter().any(|received| {
                        received.from == sent.from && received.body == sent.body
                    })
                },
            )
        })
        .count()
}

fn established_pairs(snapshot: &SystemSnapshot) -> usize {
    snapshot
        .members
        .iter()
        .flat_map(|member| member.established.iter().map(move |peer| (&member.identity, peer)))
        .filter(|(identity, peer)| identity < peer)
        .filter(|(identity, peer)| {
            snapshot
                .members
                .iter()
                .find(|member| member.identity == **peer)
                .is_some_and(|member| member.established.contains(*identity))
        })
        .count()
}
