//! Deterministic simulation harness for Huddle rooms.
//!
//! A seeded in-memory relay plays the untrusted room server. It can drop,
//! corrupt and replay frames, and every run is reproducible from its seed.
//!
//! # Model-Based Testing
//!
//! The `model` module defines [`Operation`]s that proptest and the fuzzer
//! generate and apply to a [`SimRelay`].
//!
//! # Invariant Testing
//!
//! The `invariants` module checks WHAT must hold after any operation
//! sequence. Use [`InvariantRegistry::standard()`] for the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod relay;
pub mod scenario;
pub mod sim_env;

pub use invariants::{
    DeliveryAuthenticity, FingerprintHistory, Invariant, InvariantRegistry, InvariantResult,
    MemberSnapshot, NoDuplicateDelivery, NoSelfDelivery, SentMessage, SystemSnapshot, Violation,
};
pub use model::{MAX_MEMBERS, Operation, message_body};
pub use relay::{ChaosConfig, MAX_RELAY_STEPS, RelayStats, SimMember, SimRelay};
pub use scenario::{SimConfig, SimReport, run};
pub use sim_env::SeededEnv;
