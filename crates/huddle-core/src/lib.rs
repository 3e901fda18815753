//! Huddle protocol engine
//!
//! End-to-end encrypted group messaging for a room whose every envelope is
//! visible to every participant. Each engine owns one static X25519 key pair,
//! agrees pairwise session keys with every peer that announces a key, and
//! encrypts each message once per recipient under a shared integrity chain.
//!
//! # Architecture
//!
//! The engine is sans-IO. The caller feeds it [`EngineEvent`]s (or calls the
//! matching methods directly) and executes the returned [`EngineAction`]s:
//!
//! ```text
//!   transport ──bytes──► ProtocolEngine::receive ──► [Deliver, Broadcast, ...]
//!   user      ──text───► ProtocolEngine::send    ──► [Broadcast]
//! ```
//!
//! Randomness comes from an injected [`Environment`], so simulations and
//! conformance tests are fully deterministic.
//!
//! # Components
//!
//! - [`peer`]: per-peer key state machine
//! - [`replay`]: ledger of every IV sent or accepted
//! - [`engine`]: send and receive pipelines

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod event;
pub mod peer;
pub mod replay;

pub use config::EngineConfig;
pub use engine::{PADDING_SIZE, ProtocolEngine};
pub use env::Environment;
pub use error::{ConfigError, EngineError};
pub use event::{EngineAction, EngineEvent, OutgoingEnvelope, ReceivedMessage};
pub use huddle_proto::{Identity, Target};
pub use peer::{KeyTransition, PeerState, PeerTable};
pub use replay::ReplayGuard;
