//! Client registry
//!
//! Who is online: sessions keyed by connection, plus the set of names in use.
//! Both collections change together in the same call, so every registered
//! session owns exactly one name and every used name belongs to one session.

use std::collections::{HashMap, HashSet};

use crate::client::Session;
use crate::error::NameTaken;
use crate::types::{ClientId, DisplayName};

/// Online sessions and their reserved names
///
/// Not synchronized by itself; the server keeps it behind an `RwLock`.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<ClientId, Session>,
    names: HashSet<DisplayName>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the name and register the session in one step
    ///
    /// Fails without touching anything if the name is already in use.
    pub fn join(&mut self, session: Session) -> Result<(), NameTaken> {
        if self.names.contains(&session.name) {
            return Err(NameTaken(session.name.to_string()));
        }
        self.names.insert(session.name.clone());
        self.sessions.insert(session.id, session);
        Ok(())
    }

    /// Remove a session and release its name
    ///
    /// Returns the removed session, or None if the id was not registered.
    pub fn leave(&mut self, id: ClientId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.names.remove(&session.name);
        Some(session)
    }

    /// Iterate over current sessions (unordered)
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn is_name_taken(&self, name: &DisplayName) -> bool {
        self.names.contains(name)
    }

    /// Names of all online sessions, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().map(|n| n.to_string()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
