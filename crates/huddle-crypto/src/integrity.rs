//! Per-recipient MACs and the global message tag
//!
//! ```text
//! bundle = ciphertext_1 ‖ iv_1 ‖ ciphertext_2 ‖ iv_2 ‖ ...   (sorted recipients)
//! mac_i  = HMAC-SHA-512(mac_key_i, bundle)
//! tag    = SHA-512^8(framed_plaintext ‖ mac_1 ‖ mac_2 ‖ ...)
//! ```
//!
//! Every recipient checks its own MAC over the whole bundle and the tag over
//! every recipient's MAC, so no single slice can be edited or swapped without
//! detection.

use hmac::{Hmac, Mac as _};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// Size of a per-recipient MAC in bytes
pub const MAC_SIZE: usize = 64;

/// Size of the global tag in bytes
pub const TAG_SIZE: usize = 64;

/// Number of sequential SHA-512 applications in the global tag
pub const TAG_ROUNDS: usize = 8;

/// Per-recipient HMAC-SHA-512 value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mac(pub [u8; MAC_SIZE]);

impl Mac {
    /// Raw MAC bytes.
    pub fn as_bytes(&self) -> &[u8; MAC_SIZE] {
        &self.0
    }
}

/// Global integrity tag binding plaintext to every recipient MAC.
#[derive(Debug, Clone, Copy)]
pub struct Tag(pub [u8; TAG_SIZE]);

impl Tag {
    /// Raw tag bytes.
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }
}

/// Tags compare in constant time.
impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Tag {}

/// SHA-512 of `input`.
pub fn sha512(input: &[u8]) -> [u8; 64] {
    let digest = Sha512::digest(input);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// Compute a recipient's MAC over the whole bundle.
pub fn compute_mac(mac_key: &[u8], bundle: &[u8]) -> Mac {
    let Ok(mut mac) = HmacSha512::new_from_slice(mac_key) else {
        unreachable!("HMAC-SHA512 accepts any key size");
    };
    mac.update(bundle);

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Mac(out)
}

/// Verify a received MAC in constant time.
pub fn verify_mac(mac_key: &[u8], bundle: &[u8], expected: &Mac) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(mac_key) else {
        unreachable!("HMAC-SHA512 accepts any key size");
    };
    mac.update(bundle);
    mac.verify_slice(expected.as_bytes()).is_ok()
}

/// Compute the global tag over the framed plaintext and the ordered MACs.
///
/// `macs` must be in canonical (sorted recipient) order; the same set in a
/// different order yields a different tag.
pub fn message_tag<'a>(framed: &[u8], macs: impl IntoIterator<Item = &'a Mac>) -> Tag {
    let mut input = framed.to_vec();
    for mac in macs {
        input.extend_from_slice(mac.as_bytes());
    }

    let mut digest = sha512(&input);
    for _ in 1..TAG_ROUNDS {
        digest = sha512(&digest);
    }
    Tag(digest)
}

/// Uppercase hex SHA-512 of a public key, for out-of-band comparison.
pub fn fingerprint(public_key: &[u8]) -> String {
    hex::encode_upper(sha512(public_key))
}
