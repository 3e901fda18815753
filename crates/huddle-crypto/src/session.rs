//! Per-peer session keys derived from X25519 agreement

use std::fmt;

use zeroize::Zeroize;

use crate::{
    integrity::sha512,
    keypair::{KeyPair, PublicKey},
};

/// Size of each derived session key in bytes
pub const SESSION_KEY_SIZE: usize = 32;

/// Symmetric key pair shared with one peer.
///
/// Derived as `SHA-512(X25519(my_private, peer_public))` split in half: the
/// first 32 bytes key the stream cipher, the last 32 bytes key the MAC.
///
/// # Invariants
///
/// - Both sides of a pair derive identical keys
/// - Keys change whenever either side's public key changes
pub struct SessionKeys {
    message_key: [u8; SESSION_KEY_SIZE],
    mac_key: [u8; SESSION_KEY_SIZE],
}

impl SessionKeys {
    /// Agree on session keys with a peer.
    pub fn agree(own: &KeyPair, peer: &PublicKey) -> Self {
        let shared = own.diffie_hellman(peer);
        Self::from_shared_secret(shared.as_bytes())
    }

    /// Split a raw Diffie-Hellman output into message and MAC keys.
    pub fn from_shared_secret(shared: &[u8; 32]) -> Self {
        let mut digest = sha512(shared);

        let mut message_key = [0u8; SESSION_KEY_SIZE];
        let mut mac_key = [0u8; SESSION_KEY_SIZE];
        message_key.copy_from_slice(&digest[..SESSION_KEY_SIZE]);
        mac_key.copy_from_slice(&digest[SESSION_KEY_SIZE..]);
        digest.zeroize();

        Self { message_key, mac_key }
    }

    /// Key for AES-256-CTR.
    pub fn message_key(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.message_key
    }

    /// Key for HMAC-SHA-512.
    pub fn mac_key(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.mac_key
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.message_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys([REDACTED])")
    }
}
