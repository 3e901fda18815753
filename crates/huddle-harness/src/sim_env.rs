//! Seeded environment for deterministic simulation.

use std::sync::Arc;

use huddle_core::Environment;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// ChaCha20-backed environment. The same seed always yields the same keys,
/// padding and IVs.
///
/// Clones share one RNG stream.
#[derive(Clone)]
pub struct SeededEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SeededEnv {
    /// Environment seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().fill_bytes(buffer);
    }
}
