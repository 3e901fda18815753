//! Engine configuration.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use huddle_crypto::PUBLIC_KEY_SIZE;
use huddle_proto::Identity;
use zeroize::Zeroize;

use crate::error::ConfigError;

/// Configuration for one [`crate::ProtocolEngine`].
///
/// Without a private key the engine generates a fresh one from its
/// environment. The key is zeroized when the config is dropped.
#[derive(Clone)]
pub struct EngineConfig {
    /// Our identity in the room
    pub identity: Identity,
    private_key: Option<[u8; PUBLIC_KEY_SIZE]>,
}

impl EngineConfig {
    /// Config with a fresh key pair.
    pub fn new(identity: impl Into<Identity>) -> Self {
        Self { identity: identity.into(), private_key: None }
    }

    /// Use an existing private scalar.
    pub fn with_private_key(mut self, private_key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        self.private_key = Some(private_key);
        self
    }

    /// Use a private scalar persisted as standard base64.
    pub fn with_base64_private_key(self, encoded: &str) -> Result<Self, ConfigError> {
        let mut bytes = STANDARD.decode(encoded).map_err(|_| ConfigError::InvalidBase64)?;
        let actual = bytes.len();

        let result = <[u8; PUBLIC_KEY_SIZE]>::try_from(bytes.as_slice());
        bytes.zeroize();
        let key = result.map_err(|_| ConfigError::InvalidKeyLength {
            expected: PUBLIC_KEY_SIZE,
            actual,
        })?;

        Ok(self.with_private_key(key))
    }

    /// Take the configured private key out, leaving `None`.
    pub(crate) fn take_private_key(&mut self) -> Option<[u8; PUBLIC_KEY_SIZE]> {
        self.private_key.take()
    }
}

impl Drop for EngineConfig {
    fn drop(&mut self) {
        if let Some(key) = self.private_key.as_mut() {
            key.zeroize();
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("identity", &self.identity)
            .field("private_key", &self.private_key.map(|_| "[REDACTED]"))
            .finish()
    }
}
