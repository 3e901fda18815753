//! Fuzz target for whole-room operation sequences
//!
//! Joins, leaves, rekeys, sends and partial deliveries over a relay that may
//! drop, corrupt or replay frames. Every standard invariant is checked after
//! each operation.

#![no_main]

use arbitrary::Arbitrary;
use huddle_harness::{ChaosConfig, InvariantRegistry, Operation, SimRelay};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Run {
    seed: u64,
    drop: u8,
    tamper: u8,
    replay: u8,
    operations: Vec<Operation>,
}

fuzz_target!(|run: Run| {
    let chaos = ChaosConfig {
        drop_rate: f64::from(run.drop) / 1024.0,
        tamper_rate: f64::from(run.tamper) / 512.0,
        replay_rate: f64::from(run.replay) / 512.0,
    };
    let registry = InvariantRegistry::standard();
    let mut relay = SimRelay::new(run.seed, chaos);

    for operation in run.operations.iter().take(128) {
        relay.apply(operation);
        registry.assert_all(&relay.snapshot(), &format!("after {operation:?}"));
    }
    relay.run_until_quiet();
    registry.assert_all(&relay.snapshot(), "after drain");
});
