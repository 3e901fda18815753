//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold after any sequence of sends,
//! joins, rekeys and relay misbehaviour. They are checked against a
//! [`SystemSnapshot`] taken from the relay rather than against live engines.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&relay.snapshot())?;
//! ```

use std::fmt;

mod checks;
mod snapshot;

pub use checks::{DeliveryAuthenticity, FingerprintHistory, NoDuplicateDelivery, NoSelfDelivery};
pub use snapshot::{MemberSnapshot, SentMessage, SystemSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and what broke it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Which invariant failed
    pub invariant: &'static str,
    /// Human-readable detail naming the members involved
    pub message: String,
}

impl Violation {
    /// Violation of `invariant`.
    pub fn new(invariant: &'static str, message: impl Into<String>) -> Self {
        Self { invariant, message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of the whole room checked against a [`SystemSnapshot`].
pub trait Invariant: Send + Sync {
    /// Stable name used in reports.
    fn name(&self) -> &'static str;

    /// `Err` with the first offending member found.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants run together.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// No invariants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every room invariant:
    ///
    /// - [`FingerprintHistory`]: stored keys are keys their owner announced
    /// - [`DeliveryAuthenticity`]: delivered messages were sent to us
    /// - [`NoDuplicateDelivery`]: nothing is delivered twice
    /// - [`NoSelfDelivery`]: our own envelopes never come back as messages
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(FingerprintHistory);
        registry.add(DeliveryAuthenticity);
        registry.add(NoDuplicateDelivery);
        registry.add(NoSelfDelivery);
        registry
    }

    /// Register `invariant` after the existing ones.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.invariants.iter().map(|invariant| invariant.name())
    }

    /// Run every invariant. Collects one violation per failing invariant.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> =
            self.invariants.iter().filter_map(|invariant| invariant.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// [`check_all`](Self::check_all), panicking with every violation and
    /// `context` on failure.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        let Err(violations) = self.check_all(state) else {
            return;
        };
        let report = violations.iter().map(|violation| format!("\n  {violation}")).collect::<String>();
        panic!("{} invariant(s) broken {context}:{report}", violations.len());
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
