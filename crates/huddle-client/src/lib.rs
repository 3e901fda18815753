//! Client
//!
//! Room-level wrapper around [`huddle_core`]. One engine per joined room,
//! each with its own key pair, routed by room name.
//!
//! # Architecture
//!
//! Like the engine it wraps, the client performs no I/O. Callers hand it
//! inbound envelopes and membership notifications from their transport and
//! broadcast whatever [`EngineAction::Broadcast`] envelopes come back.
//!
//! # Components
//!
//! - [`Rooms`]: registry of joined rooms
//! - [`SharedEngine`]: thread-safe handle to a single room's engine
//! - [`SystemEnv`]: production randomness from the OS

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod rooms;
mod shared;
mod system_env;

pub use error::ClientError;
pub use huddle_core::{
    EngineAction, EngineConfig, EngineError, EngineEvent, Environment, Identity, OutgoingEnvelope,
    ReceivedMessage, Target,
};
pub use rooms::Rooms;
pub use shared::SharedEngine;
pub use system_env::SystemEnv;
