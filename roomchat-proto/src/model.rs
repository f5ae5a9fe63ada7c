//! Data model shared with the REST backend.
//!
//! Messages, participants and rooms are created by the backend; the client
//! only receives and displays copies. The request bodies at the bottom of
//! this module are the only values the client constructs itself, and they
//! validate their input before anything goes on the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Errors raised when user input is rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A room name was empty after trimming.
    #[error("room name cannot be empty")]
    EmptyRoomName,

    /// A participant name was empty after trimming.
    #[error("user name cannot be empty")]
    EmptyUserName,

    /// A message body contained only whitespace.
    #[error("message cannot be empty")]
    EmptyMessage,
}

/// Deserialize an integer id that the backend may render as a number or as
/// a numeric string.
fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid id {s:?}"))),
    }
}

/// Identifier of a message, unique within a room.
///
/// Ordered so that it can be used both for de-duplication and for stable
/// sorting in tests. The store never reorders by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(#[serde(deserialize_with = "lenient_id")] i64);

impl MessageId {
    /// Wrap a raw backend id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw backend id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(#[serde(deserialize_with = "lenient_id")] i64);

impl ParticipantId {
    /// Wrap a raw backend id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw backend id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Identifier of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(#[serde(deserialize_with = "lenient_id")] i64);

impl RoomId {
    /// Wrap a raw backend id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw backend id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A chat participant as the backend describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Backend identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
}

impl Participant {
    /// Create a participant value.
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Avatar fallback text.
    ///
    /// Multi-word names use the first letter of the first two words; a
    /// single word uses its first two letters. Always upper-case.
    #[must_use]
    pub fn initials(&self) -> String {
        let mut words = self.name.split_whitespace();
        match (words.next(), words.next()) {
            (Some(first), Some(second)) => first
                .chars()
                .take(1)
                .chain(second.chars().take(1))
                .flat_map(char::to_uppercase)
                .collect(),
            (Some(only), None) => only.chars().take(2).flat_map(char::to_uppercase).collect(),
            _ => String::new(),
        }
    }
}

/// One chat message. Immutable once created by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique within the room.
    pub id: MessageId,
    /// Message text.
    pub body: String,
    /// Creation time assigned by the backend.
    pub created_at: DateTime<Utc>,
    /// Author of the message.
    pub user: Participant,
}

/// A room as listed by `GET /chatrooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Backend identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
}

/// A room with its message history, as returned by `GET /chatrooms/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetails {
    /// Backend identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Stored history, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Message text, sent as typed.
    pub body: String,
    /// Author.
    pub user_id: ParticipantId,
    /// Target room.
    pub chatroom_id: RoomId,
}

impl NewMessage {
    /// Build a message post, rejecting whitespace-only bodies.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyMessage`] if `body` is blank.
    pub fn new(
        body: impl Into<String>,
        user_id: ParticipantId,
        chatroom_id: RoomId,
    ) -> Result<Self, ValidationError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(Self {
            body,
            user_id,
            chatroom_id,
        })
    }
}

/// Body of `POST /chatrooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    /// Trimmed, non-empty room name.
    pub name: String,
}

impl NewRoom {
    /// Validate and trim a room name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRoomName`] if the trimmed name is empty.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyRoomName);
        }
        Ok(Self {
            name: name.to_string(),
        })
    }
}

/// Body of `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParticipant {
    /// Trimmed, non-empty user name.
    pub name: String,
}

impl NewParticipant {
    /// Validate and trim a user name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyUserName`] if the trimmed name is empty.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyUserName);
        }
        Ok(Self {
            name: name.to_string(),
        })
    }
}
