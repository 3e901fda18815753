//! Registry of joined rooms.
//!
//! Every room gets an independent engine with its own key pair, so keys,
//! sessions and replay ledgers never leak between rooms. The same nickname is
//! used in all of them.

use std::collections::{BTreeMap, BTreeSet};

use huddle_core::{EngineAction, EngineConfig, Environment, Identity};

use crate::{error::ClientError, shared::SharedEngine};

/// Joined rooms keyed by room name.
pub struct Rooms<E: Environment> {
    env: E,
    nickname: Identity,
    rooms: BTreeMap<String, SharedEngine<E>>,
}

impl<E: Environment> Rooms<E> {
    /// Empty registry for `nickname`.
    pub fn new(env: E, nickname: impl Into<Identity>) -> Self {
        Self { env, nickname: nickname.into(), rooms: BTreeMap::new() }
    }

    /// Our nickname in every room.
    pub fn nickname(&self) -> &Identity {
        &self.nickname
    }

    /// Join `room` with a fresh key pair. Returns the initial announcement.
    ///
    /// # Errors
    ///
    /// - `RoomAlreadyJoined` if an engine for `room` exists
    pub fn join(&mut self, room: &str) -> Result<Vec<EngineAction>, ClientError> {
        self.join_with(room, EngineConfig::new(self.nickname.clone()))
    }

    /// Join `room` reusing a private key persisted as standard base64.
    ///
    /// # Errors
    ///
    /// - `RoomAlreadyJoined` if an engine for `room` exists
    /// - `Config` if the stored key cannot be decoded
    pub fn join_with_key(
        &mut self,
        room: &str,
        private_key: &str,
    ) -> Result<Vec<EngineAction>, ClientError> {
        let config = EngineConfig::new(self.nickname.clone()).with_base64_private_key(private_key)?;
        self.join_with(room, config)
    }

    fn join_with(
        &mut self,
        room: &str,
        config: EngineConfig,
    ) -> Result<Vec<EngineAction>, ClientError> {
        if self.rooms.contains_key(room) {
            return Err(ClientError::RoomAlreadyJoined { room: room.to_string() });
        }

        let engine = SharedEngine::from_config(self.env.clone(), config);
        let actions = engine.init();
        self.rooms.insert(room.to_string(), engine);

        tracing::info!(room = %room, nickname = %self.nickname, "joined room");
        Ok(actions)
    }

    /// Leave `room`, dropping its engine and every session key in it.
    pub fn leave(&mut self, room: &str) -> Result<(), ClientError> {
        self.rooms.remove(room).ok_or_else(|| unknown(room))?;
        tracing::info!(room = %room, "left room");
        Ok(())
    }

    /// Encrypt `plaintext` for everyone keyed in `room`.
    pub fn send(&self, room: &str, plaintext: &[u8]) -> Result<Vec<EngineAction>, ClientError> {
        Ok(self.room(room)?.send(plaintext, &BTreeSet::new())?)
    }

    /// Feed an envelope from `sender` to the engine for `room`.
    pub fn receive(
        &self,
        room: &str,
        sender: &Identity,
        bytes: &[u8],
    ) -> Result<Vec<EngineAction>, ClientError> {
        Ok(self.room(room)?.receive(sender, bytes)?)
    }

    /// Transport reports `identity` joined `room`.
    pub fn peer_joined(&self, room: &str, identity: &Identity) -> Result<(), ClientError> {
        self.room(room)?.peer_joined(identity);
        Ok(())
    }

    /// Transport reports `identity` left `room`.
    pub fn peer_left(&self, room: &str, identity: &Identity) -> Result<(), ClientError> {
        self.room(room)?.destroy_peer(identity);
        Ok(())
    }

    /// Fingerprint of `identity`'s key in `room`, if known.
    pub fn fingerprint(&self, room: &str, identity: &Identity) -> Result<Option<String>, ClientError> {
        Ok(self.room(room)?.fingerprint(identity))
    }

    /// Handle to the engine for `room`.
    pub fn engine(&self, room: &str) -> Result<SharedEngine<E>, ClientError> {
        self.room(room).cloned()
    }

    /// Joined room names in sorted order.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    fn room(&self, room: &str) -> Result<&SharedEngine<E>, ClientError> {
        self.rooms.get(room).ok_or_else(|| unknown(room))
    }
}

fn unknown(room: &str) -> ClientError {
    ClientError::UnknownRoom { room: room.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemEnv;

    #[test]
    fn join_announces_and_registers() {
        let mut rooms = Rooms::new(SystemEnv::new(), "alice");

        let actions = rooms.join("lobby").unwrap();

        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|action| action.as_broadcast().is_some()));
        assert_eq!(rooms.rooms().collect::<Vec<_>>(), vec!["lobby"]);
    }

    #[test]
    fn double_join_rejected() {
        let mut rooms = Rooms::new(SystemEnv::new(), "alice");
        rooms.join("lobby").unwrap();

        assert_eq!(
            rooms.join("lobby").unwrap_err(),
            ClientError::RoomAlreadyJoined { room: "lobby".into() }
        );
    }

    #[test]
    fn unknown_room_rejected() {
        let mut rooms = Rooms::new(SystemEnv::new(), "alice");
        let unknown = ClientError::UnknownRoom { room: "attic".into() };

        assert_eq!(rooms.send("attic", b"hi").unwrap_err(), unknown);
        assert_eq!(rooms.receive("attic", &Identity::from("bob"), b"{}").unwrap_err(), unknown);
        assert_eq!(rooms.leave("attic").unwrap_err(), unknown);
        assert_eq!(rooms.fingerprint("attic", &Identity::from("bob")).unwrap_err(), unknown);
    }

    #[test]
    fn rooms_have_independent_keys() {
        let mut rooms = Rooms::new(SystemEnv::new(), "alice");
        rooms.join("lobby").unwrap();
        rooms.join("kitchen").unwrap();

        let lobby = rooms.engine("lobby").unwrap().own_fingerprint();
        let kitchen = rooms.engine("kitchen").unwrap().own_fingerprint();
        assert_ne!(lobby, kitchen);
    }

    #[test]
    fn persisted_key_is_reused() {
        let mut rooms = Rooms::new(SystemEnv::new(), "alice");
        rooms.join("lobby").unwrap();
        let engine = rooms.engine("lobby").unwrap();
        let stored = engine.with(|engine| engine.export_private_key());

        rooms.leave("lobby").unwrap();
        rooms.join_with_key("lobby", &stored).unwrap();

        assert_eq!(rooms.engine("lobby").unwrap().own_fingerprint(), engine.own_fingerprint());
        assert!(matches!(
            rooms.join_with_key("den", "%%%"),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn membership_routes_to_room() {
        let mut rooms = Rooms::new(SystemEnv::new(), "alice");
        rooms.join("lobby").unwrap();
        let bob = Identity::from("bob");

        rooms.peer_joined("lobby", &bob).unwrap();
        assert!(rooms.engine("lobby").unwrap().with(|engine| engine.peer_state(&bob).is_some()));

        rooms.peer_left("lobby", &bob).unwrap();
        assert!(rooms.engine("lobby").unwrap().with(|engine| engine.peer_state(&bob).is_none()));
    }
}
