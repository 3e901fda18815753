//! Thread-safe engine handle.
//!
//! A whole `send` or `receive` runs under one lock, so the MAC check and the
//! replay-ledger insert of one envelope can never interleave with another
//! envelope's, and two concurrent sends never draw the same IV.

use std::{collections::BTreeSet, sync::Arc};

use huddle_core::{
    EngineAction, EngineConfig, EngineError, EngineEvent, Environment, Identity, ProtocolEngine,
};
use parking_lot::Mutex;

/// Cloneable handle to one room's engine.
#[derive(Clone)]
pub struct SharedEngine<E: Environment> {
    inner: Arc<Mutex<ProtocolEngine<E>>>,
}

impl<E: Environment> SharedEngine<E> {
    /// Wrap an existing engine.
    pub fn new(engine: ProtocolEngine<E>) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }

    /// Build and wrap a fresh engine.
    pub fn from_config(env: E, config: EngineConfig) -> Self {
        Self::new(ProtocolEngine::new(env, config))
    }

    /// See [`ProtocolEngine::handle`].
    pub fn handle(&self, event: EngineEvent) -> Result<Vec<EngineAction>, EngineError> {
        self.inner.lock().handle(event)
    }

    /// See [`ProtocolEngine::init`].
    pub fn init(&self) -> Vec<EngineAction> {
        self.inner.lock().init()
    }

    /// See [`ProtocolEngine::send`].
    pub fn send(
        &self,
        plaintext: &[u8],
        exclude: &BTreeSet<Identity>,
    ) -> Result<Vec<EngineAction>, EngineError> {
        self.inner.lock().send(plaintext, exclude)
    }

    /// See [`ProtocolEngine::receive`].
    pub fn receive(
        &self,
        sender: &Identity,
        bytes: &[u8],
    ) -> Result<Vec<EngineAction>, EngineError> {
        self.inner.lock().receive(sender, bytes)
    }

    /// See [`ProtocolEngine::peer_joined`].
    pub fn peer_joined(&self, identity: &Identity) {
        self.inner.lock().peer_joined(identity);
    }

    /// See [`ProtocolEngine::destroy_peer`].
    pub fn destroy_peer(&self, identity: &Identity) {
        self.inner.lock().destroy_peer(identity);
    }

    /// See [`ProtocolEngine::fingerprint`].
    pub fn fingerprint(&self, identity: &Identity) -> Option<String> {
        self.inner.lock().fingerprint(identity)
    }

    /// See [`ProtocolEngine::own_fingerprint`].
    pub fn own_fingerprint(&self) -> String {
        self.inner.lock().own_fingerprint()
    }

    /// Our identity in this room.
    pub fn identity(&self) -> Identity {
        self.inner.lock().identity().clone()
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut ProtocolEngine<E>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
