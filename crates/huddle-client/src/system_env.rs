//! Production environment backed by the OS RNG.

use huddle_core::Environment;

/// Production environment using OS cryptographic randomness.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without working randomness neither keys nor
/// IVs can be generated safely, so there is nothing to fall back to.
#[derive(Clone, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_differ() {
        let env = SystemEnv::new();

        let first: [u8; 32] = env.random_array();
        let second: [u8; 32] = env.random_array();

        assert_ne!(first, second, "Random bytes should differ");
    }

    #[test]
    fn random_bytes_fill_buffer() {
        let env = SystemEnv::new();

        let mut bytes = [0u8; 64];
        env.random_bytes(&mut bytes);

        let non_zero = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero > 32, "Most bytes should be non-zero");
    }
}
