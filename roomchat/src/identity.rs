//! Process-local session scope and local identity resolution.
//!
//! The scope is a small string key-value map that lives as long as the
//! process. The selection screens write the chosen participant into it and
//! the room session reads it back on activation.

use std::collections::HashMap;

use parking_lot::RwLock;

use roomchat_proto::model::{Participant, ParticipantId};

/// Key holding the local participant's display name.
pub const USER_KEY: &str = "user";

/// Key holding the local participant's identifier.
pub const USER_ID_KEY: &str = "userId";

/// Key-value storage scoped to this process.
#[derive(Debug, Default)]
pub struct SessionScope {
    values: RwLock<HashMap<String, String>>,
}

impl SessionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Write a value, replacing any previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Record `participant` as the local identity.
    ///
    /// Both keys are written under one lock so a concurrent reader never sees
    /// a name paired with another participant's id.
    pub fn set_participant(&self, participant: &Participant) {
        let mut values = self.values.write();
        values.insert(USER_KEY.to_string(), participant.name.clone());
        values.insert(USER_ID_KEY.to_string(), participant.id.to_string());
        tracing::debug!(user_id = %participant.id, "local identity recorded");
    }

    /// Forget the local identity.
    pub fn clear_participant(&self) {
        let mut values = self.values.write();
        values.remove(USER_KEY);
        values.remove(USER_ID_KEY);
    }

    /// The local participant, if both keys are set and the id parses.
    #[must_use]
    pub fn resolve_participant(&self) -> Option<Participant> {
        let values = self.values.read();
        let name = values.get(USER_KEY)?;
        let raw_id = values.get(USER_ID_KEY)?;
        match raw_id.parse::<ParticipantId>() {
            Ok(id) => Some(Participant::new(id, name.clone())),
            Err(_) => {
                tracing::warn!(raw_id = %raw_id, "stored user id is not numeric");
                None
            }
        }
    }
}
