//! Environment abstraction for deterministic testing.
//!
//! The engine never touches OS entropy directly. Production code plugs in a
//! system-backed environment; tests plug in seeded or counter-based ones so
//! that every envelope is reproducible byte for byte.

/// Source of randomness for the engine.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `random_bytes()` fills the whole buffer
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Fixed-size array of random bytes.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}
