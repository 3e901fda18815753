//! AES-256-CTR stream encryption
//!
//! All functions are pure - IV randomness must be provided by the caller.
//! Encryption and decryption are the same keystream XOR.

use aes::Aes256;
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};

use crate::{error::CryptoError, session::SESSION_KEY_SIZE};

/// Size of an IV on the wire (one AES block)
pub const IV_SIZE: usize = 16;

/// Number of random bytes in an IV; the remaining four are zero
pub const IV_RANDOM_SIZE: usize = 12;

type Aes256Ctr = Ctr128BE<Aes256>;

/// Initialization vector for one recipient slice.
///
/// Structure:
/// - bytes 0-11: random (caller-provided)
/// - bytes 12-15: zero, the low bits of the block counter
///
/// The counter is a full 128-bit big-endian integer, so a message longer than
/// 2^32 blocks carries into the random bytes instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    /// Build an IV from 12 random bytes.
    pub fn from_random(random: [u8; IV_RANDOM_SIZE]) -> Self {
        let mut iv = [0u8; IV_SIZE];
        iv[..IV_RANDOM_SIZE].copy_from_slice(&random);
        Self(iv)
    }

    /// Wrap an IV exactly as received on the wire.
    ///
    /// The value is kept verbatim because the MAC and the replay ledger cover
    /// the transmitted bytes; [`Iv::keystream_iv`] normalizes it for the
    /// cipher.
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse an IV from untrusted bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidIvLength` if `bytes` is not exactly 16 bytes long
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; IV_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidIvLength { expected: IV_SIZE, actual: bytes.len() })?;
        Ok(Self(array))
    }

    /// Raw IV bytes as transmitted.
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }

    /// Initial counter block: the random prefix with the counter bytes zeroed.
    pub fn keystream_iv(&self) -> [u8; IV_SIZE] {
        let mut block = [0u8; IV_SIZE];
        block[..IV_RANDOM_SIZE].copy_from_slice(&self.0[..IV_RANDOM_SIZE]);
        block
    }
}

/// XOR `data` with the AES-256-CTR keystream for `(key, iv)`.
///
/// Used for both directions. Output length always equals input length.
pub fn apply_keystream(key: &[u8; SESSION_KEY_SIZE], iv: &Iv, data: &[u8]) -> Vec<u8> {
    let counter_block = iv.keystream_iv();
    let mut cipher = Aes256Ctr::new(key.into(), (&counter_block).into());

    let mut buffer = data.to_vec();
    cipher.apply_keystream(&mut buffer);
    buffer
}
