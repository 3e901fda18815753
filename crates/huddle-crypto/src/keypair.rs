//! Static X25519 key pairs
//!
//! One key pair per engine. The private scalar is either generated from
//! caller-provided random bytes or restored from persisted storage.

use std::fmt;

use x25519_dalek::{PublicKey as DalekPublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Size of an X25519 public value (and private scalar) in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// A peer's X25519 public value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a public key from untrusted bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` if `bytes` is not exactly 32 bytes long
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: PUBLIC_KEY_SIZE, actual: bytes.len() }
        })?;
        Ok(Self(array))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

/// Long-lived X25519 key pair.
///
/// # Security
///
/// The private scalar is clamped on use (RFC 7748) and zeroized when the key
/// pair is dropped. `Debug` output never includes it.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Build a key pair from a 32-byte private scalar.
    ///
    /// Use this both for fresh keys (pass 32 bytes from a CSPRNG) and for keys
    /// restored from storage.
    pub fn from_secret_bytes(mut secret: [u8; PUBLIC_KEY_SIZE]) -> Self {
        let static_secret = StaticSecret::from(secret);
        secret.zeroize();

        let public = PublicKey(DalekPublicKey::from(&static_secret).to_bytes());
        Self { secret: static_secret, public }
    }

    /// Build a key pair from an untrusted private key slice.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` if `bytes` is not exactly 32 bytes long
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: PUBLIC_KEY_SIZE, actual: bytes.len() }
        })?;
        Ok(Self::from_secret_bytes(secret))
    }

    /// Our public value, announced to peers.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Private scalar bytes, for handing to a persistence layer.
    ///
    /// The caller owns the returned copy and is responsible for zeroizing it.
    pub fn secret_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.secret.to_bytes()
    }

    /// Raw X25519 scalar multiplication with a peer's public value.
    pub(crate) fn diffie_hellman(&self, peer: &PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(&DalekPublicKey::from(peer.0))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
