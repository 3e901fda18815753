//! Model-based property tests.
//!
//! proptest generates raw bytes, `arbitrary` turns them into an operation
//! sequence, and the sequence runs against a relay. Invariants are checked
//! after every operation, not only at the end.

use arbitrary::{Arbitrary, Unstructured};
use huddle_harness::{ChaosConfig, InvariantRegistry, Operation, SimRelay};
use proptest::prelude::*;

fn operations(bytes: &[u8]) -> Vec<Operation> {
    let mut unstructured = Unstructured::new(bytes);
    let mut operations = vec![Operation::Join, Operation::Join];
    while let Ok(operation) = Operation::arbitrary(&mut unstructured) {
        operations.push(operation);
        if unstructured.is_empty() {
            break;
        }
    }
    operations
}

fn check(seed: u64, chaos: ChaosConfig, bytes: &[u8]) -> Result<(), TestCaseError> {
    let registry = InvariantRegistry::standard();
    let mut relay = SimRelay::new(seed, chaos);

    for (step, operation) in operations(bytes).iter().enumerate() {
        relay.apply(operation);
        if let Err(violations) = registry.check_all(&relay.snapshot()) {
            return Err(TestCaseError::fail(format!(
                "step {step} ({operation:?}): {violations:?}"
            )));
        }
    }

    relay.run_until_quiet();
    if let Err(violations) = registry.check_all(&relay.snapshot()) {
        return Err(TestCaseError::fail(format!("after drain: {violations:?}")));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_calm_relay_upholds_invariants(
        seed in any::<u64>(),
        bytes in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        check(seed, ChaosConfig::none(), &bytes)?;
    }

    #[test]
    fn prop_hostile_relay_upholds_invariants(
        seed in any::<u64>(),
        bytes in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let chaos = ChaosConfig { drop_rate: 0.1, tamper_rate: 0.2, replay_rate: 0.2 };
        check(seed, chaos, &bytes)?;
    }
}
