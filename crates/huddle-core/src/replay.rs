//! Replay ledger.
//!
//! Every IV we generate and every IV we accept is recorded. An incoming slice
//! whose IV is already present is a replay (or a collision with one of our own
//! outgoing IVs) and is rejected.
//!
//! # Invariants
//!
//! - Append-only: entries are never removed for the life of the engine.
//! - IVs are recorded exactly as transmitted, including the counter bytes.

use std::collections::HashSet;

use huddle_crypto::IV_SIZE;

/// Set of IVs seen by one engine.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    seen: HashSet<[u8; IV_SIZE]>,
}

impl ReplayGuard {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `iv` was recorded before.
    pub fn contains(&self, iv: &[u8; IV_SIZE]) -> bool {
        self.seen.contains(iv)
    }

    /// Record `iv`. Returns false if it was already present.
    pub fn insert(&mut self, iv: [u8; IV_SIZE]) -> bool {
        self.seen.insert(iv)
    }

    /// Number of recorded IVs.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_insert_rejected() {
        let mut guard = ReplayGuard::new();
        assert!(guard.insert([1; IV_SIZE]));
        assert!(!guard.insert([1; IV_SIZE]));
        assert!(guard.contains(&[1; IV_SIZE]));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn counter_bytes_are_significant() {
        let mut guard = ReplayGuard::new();
        let mut iv = [9; IV_SIZE];
        iv[12..].fill(0);
        assert!(guard.insert(iv));

        iv[15] = 1;
        assert!(!guard.contains(&iv));
        assert!(guard.insert(iv));
    }
}
