//! Envelope types and their JSON encoding.
//!
//! The domain types ([`Envelope`] and friends) hold decoded bytes; a private
//! mirror of them holds the base64 strings that actually go over the wire.
//! Keeping the two apart means the engine never sees a half-decoded value.
//!
//! # Invariants
//!
//! - Recipients are kept in a `BTreeMap`, so iteration and encoding follow
//!   the canonical sorted identity order.
//! - Encoding is deterministic: the same envelope always produces the same
//!   bytes.
//! - Absent or empty-string recipient fields decode as missing, never as
//!   zero-length values.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    identity::{Identity, Target},
};

/// Largest envelope the decoder will look at (16 MiB)
pub const MAX_ENVELOPE_SIZE: usize = 16 * 1024 * 1024;

const IV_SIZE: usize = 16;
const MAC_SIZE: usize = 64;
const TAG_SIZE: usize = 64;

/// Everything that can be broadcast into a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Sender announces its public key
    PublicKey(KeyAnnouncement),
    /// Sender asks one member, or everyone, to announce their key
    PublicKeyRequest(KeyRequest),
    /// Encrypted multi-recipient message
    Message(MulticastMessage),
}

/// Public key announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAnnouncement {
    /// Raw key bytes. Length is checked by the engine, not the decoder.
    pub key: Vec<u8>,
}

/// Request for a public key announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    /// Who should answer
    pub target: Target,
}

/// One encrypted message for a set of recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastMessage {
    /// Per-recipient slices in canonical order
    pub recipients: BTreeMap<Identity, RecipientSlice>,
    /// Global tag over the framed plaintext and every MAC
    pub tag: [u8; TAG_SIZE],
}

/// A single recipient's part of a [`MulticastMessage`].
///
/// Fields are optional because a relay (or a sender that lists a member it
/// has no key for) may leave them out. Only complete slices take part in MAC
/// verification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecipientSlice {
    /// AES-CTR ciphertext of the framed plaintext
    pub ciphertext: Option<Vec<u8>>,
    /// IV exactly as transmitted
    pub iv: Option<[u8; IV_SIZE]>,
    /// HMAC over the whole bundle under this recipient's MAC key
    pub mac: Option<[u8; MAC_SIZE]>,
}

impl RecipientSlice {
    /// A slice with every field present.
    pub fn new(ciphertext: Vec<u8>, iv: [u8; IV_SIZE], mac: [u8; MAC_SIZE]) -> Self {
        Self { ciphertext: Some(ciphertext), iv: Some(iv), mac: Some(mac) }
    }

    /// Whether ciphertext, IV and MAC are all present.
    pub fn is_complete(&self) -> bool {
        self.parts().is_some()
    }

    /// Borrow all three fields, or `None` if any is missing.
    pub fn parts(&self) -> Option<(&[u8], &[u8; IV_SIZE], &[u8; MAC_SIZE])> {
        match (&self.ciphertext, &self.iv, &self.mac) {
            (Some(ciphertext), Some(iv), Some(mac)) => Some((ciphertext.as_slice(), iv, mac)),
            _ => None,
        }
    }
}

impl Envelope {
    /// Wire name of this envelope kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PublicKey(_) => "public_key",
            Self::PublicKeyRequest(_) => "public_key_request",
            Self::Message(_) => "message",
        }
    }

    /// Encode to JSON bytes.
    ///
    /// Recipients are written in sorted order and absent slice fields are
    /// omitted, so the output is a pure function of the envelope value.
    pub fn encode(&self) -> Vec<u8> {
        let wire = WireEnvelope::from(self);
        let Ok(bytes) = serde_json::to_vec(&wire) else {
            unreachable!("envelopes contain only strings and string-keyed maps");
        };
        bytes
    }

    /// Decode JSON bytes.
    ///
    /// # Security
    ///
    /// - The size check happens before parsing starts.
    /// - Unknown `type` values are rejected, not ignored.
    /// - Unknown extra fields are ignored for forward compatibility.
    ///
    /// # Errors
    ///
    /// - `EnvelopeTooLarge` if `bytes` exceeds [`MAX_ENVELOPE_SIZE`]
    /// - `Malformed` for invalid JSON, unknown `type` or missing fields
    /// - `InvalidBase64` / `InvalidLength` for bad binary fields
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(ProtocolError::EnvelopeTooLarge {
                size: bytes.len(),
                max: MAX_ENVELOPE_SIZE,
            });
        }

        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        Self::try_from(wire)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEnvelope {
    PublicKey {
        key: String,
    },
    PublicKeyRequest {
        #[serde(default)]
        target: Option<String>,
    },
    Message {
        recipients: BTreeMap<String, WireSlice>,
        tag: String,
    },
}

#[derive(Serialize, Deserialize, Default)]
struct WireSlice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ciphertext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mac: Option<String>,
}

impl From<&Envelope> for WireEnvelope {
    fn from(envelope: &Envelope) -> Self {
        match envelope {
            Envelope::PublicKey(announcement) => {
                Self::PublicKey { key: STANDARD.encode(&announcement.key) }
            },
            Envelope::PublicKeyRequest(request) => {
                Self::PublicKeyRequest { target: Some(request.target.as_wire().to_string()) }
            },
            Envelope::Message(message) => Self::Message {
                recipients: message
                    .recipients
                    .iter()
                    .map(|(identity, slice)| (identity.as_str().to_string(), WireSlice::from(slice)))
                    .collect(),
                tag: STANDARD.encode(message.tag),
            },
        }
    }
}

impl From<&RecipientSlice> for WireSlice {
    fn from(slice: &RecipientSlice) -> Self {
        Self {
            ciphertext: slice.ciphertext.as_ref().map(|bytes| STANDARD.encode(bytes)),
            iv: slice.iv.as_ref().map(|bytes| STANDARD.encode(bytes)),
            mac: slice.mac.as_ref().map(|bytes| STANDARD.encode(bytes)),
        }
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = ProtocolError;

    fn try_from(wire: WireEnvelope) -> Result<Self> {
        match wire {
            WireEnvelope::PublicKey { key } => {
                Ok(Self::PublicKey(KeyAnnouncement { key: decode_base64("key", &key)? }))
            },
            WireEnvelope::PublicKeyRequest { target } => Ok(Self::PublicKeyRequest(KeyRequest {
                target: Target::from_wire(target.as_deref().unwrap_or_default()),
            })),
            WireEnvelope::Message { recipients, tag } => {
                let tag = decode_fixed::<TAG_SIZE>("tag", &tag)?;
                let recipients = recipients
                    .into_iter()
                    .map(|(identity, slice)| Ok((Identity::from(identity), slice.try_into()?)))
                    .collect::<Result<BTreeMap<_, _>>>()?;

                Ok(Self::Message(MulticastMessage { recipients, tag }))
            },
        }
    }
}

impl TryFrom<WireSlice> for RecipientSlice {
    type Error = ProtocolError;

    fn try_from(wire: WireSlice) -> Result<Self> {
        let ciphertext = match present(wire.ciphertext) {
            Some(value) => Some(decode_base64("ciphertext", &value)?),
            None => None,
        };
        let iv = match present(wire.iv) {
            Some(value) => Some(decode_fixed::<IV_SIZE>("iv", &value)?),
            None => None,
        };
        let mac = match present(wire.mac) {
            Some(value) => Some(decode_fixed::<MAC_SIZE>("mac", &value)?),
            None => None,
        };

        Ok(Self { ciphertext, iv, mac })
    }
}

/// Empty strings count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn decode_base64(field: &'static str, value: &str) -> Result<Vec<u8>> {
    STANDARD.decode(value).map_err(|_| ProtocolError::InvalidBase64 { field })
}

fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_base64(field, value)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| ProtocolError::InvalidLength { field, expected: N, actual })
}
