//! Huddle Cryptographic Primitives
//!
//! Cryptographic building blocks for the Huddle group protocol. Pure functions
//! with deterministic outputs. Callers provide random bytes (private scalars,
//! IV material) so that every operation can be replayed in tests.
//!
//! # Key Lifecycle
//!
//! Each engine owns one static X25519 key pair for its whole lifetime. For
//! every peer whose public key is known, a pair of symmetric keys is derived
//! from the Diffie-Hellman output:
//!
//! ```text
//! X25519(my_private, peer_public)
//!        │
//!        ▼
//! SHA-512 → 64 bytes
//!        │
//!        ├── [0..32]  message key → AES-256-CTR
//!        └── [32..64] MAC key     → HMAC-SHA-512
//! ```
//!
//! # Integrity Chain
//!
//! A multicast bundle carries one ciphertext per recipient. Every recipient's
//! MAC covers the concatenation of all `(ciphertext ‖ iv)` pairs, and a global
//! tag (SHA-512 applied eight times) binds the framed plaintext to every MAC.
//! A relay that edits, swaps or strips one recipient's slice invalidates the
//! MAC or tag seen by all other recipients.
//!
//! # Security
//!
//! - No forward secrecy: session keys live as long as the peer's public key
//! - Session keys and private scalars are zeroized on drop
//! - MAC and tag comparisons are constant time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod integrity;
pub mod keypair;
pub mod session;

pub use cipher::{IV_RANDOM_SIZE, IV_SIZE, Iv, apply_keystream};
pub use error::CryptoError;
pub use integrity::{
    MAC_SIZE, Mac, TAG_ROUNDS, TAG_SIZE, Tag, compute_mac, fingerprint, message_tag, sha512,
    verify_mac,
};
pub use keypair::{KeyPair, PUBLIC_KEY_SIZE, PublicKey};
pub use session::{SESSION_KEY_SIZE, SessionKeys};
