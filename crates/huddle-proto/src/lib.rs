//! Huddle wire format
//!
//! Envelopes exchanged over the untrusted room broadcast. Three kinds exist:
//! key announcements, key requests, and multi-recipient messages. All of them
//! travel as JSON objects discriminated by a `type` field, with binary values
//! in standard base64.
//!
//! ```text
//! { "type": "public_key",         "key": b64 }
//! { "type": "public_key_request", "target": "" | identity }
//! { "type": "message",
//!   "recipients": { identity: { "ciphertext": b64, "iv": b64, "mac": b64 } },
//!   "tag": b64 }
//! ```
//!
//! This crate only checks structure (field presence, base64, fixed sizes of
//! `iv`, `mac` and `tag`). Semantic checks such as key length belong to the
//! engine so that they surface as their own error kinds.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod errors;
mod identity;

pub use envelope::{
    Envelope, KeyAnnouncement, KeyRequest, MAX_ENVELOPE_SIZE, MulticastMessage, RecipientSlice,
};
pub use errors::{ProtocolError, Result};
pub use identity::{Identity, Target};
