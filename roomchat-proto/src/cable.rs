//! Pub/sub socket frames.
//!
//! The broker speaks a channel-based protocol over JSON text frames. The
//! client sends exactly one outbound frame per connection, the identify
//! (subscribe) command:
//!
//! ```text
//! { "command": "subscribe",
//!   "identifier": "{\"id\":\"<handle>\",\"channel\":\"MessagesChannel\"}" }
//! ```
//!
//! Note that `identifier` is itself a JSON document encoded as a string.
//!
//! Inbound frames carry a `type` discriminator for control traffic
//! (`ping`, `welcome`, `confirm_subscription`). Every other frame is a data
//! frame whose `message` field holds one [`Message`].

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::Message;

/// Channel every room view subscribes to.
pub const MESSAGES_CHANNEL: &str = "MessagesChannel";

/// The only command the client ever sends.
pub const SUBSCRIBE_COMMAND: &str = "subscribe";

/// Length of a generated [`SubscriptionHandle`].
const HANDLE_LEN: usize = 13;

/// Alphabet used for generated handles.
const HANDLE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Errors produced while encoding or decoding socket frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame was not a JSON object.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A data frame carried no `message` field.
    #[error("data frame without message (type {kind:?})")]
    MissingMessage {
        /// The `type` discriminator, if the frame had one.
        kind: Option<String>,
    },

    /// The `message` field did not have the shape of a chat message.
    #[error("invalid message payload: {0}")]
    InvalidMessage(#[source] serde_json::Error),

    /// An outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Client-generated correlation token for one socket connection.
///
/// Carries no server-assigned meaning. A fresh handle is generated every
/// time a socket is opened or reopened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(String);

impl SubscriptionHandle {
    /// Generate a random 13 character base-36 handle.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let token = (0..HANDLE_LEN)
            .map(|_| char::from(HANDLE_ALPHABET[rng.random_range(0..HANDLE_ALPHABET.len())]))
            .collect();
        Self(token)
    }

    /// Wrap an existing token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The decoded contents of the `identifier` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelIdentifier {
    /// Subscription handle text.
    pub id: String,
    /// Channel name.
    pub channel: String,
}

/// Outbound identify/subscribe command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeCommand {
    /// Always [`SUBSCRIBE_COMMAND`].
    pub command: String,
    /// JSON-encoded [`ChannelIdentifier`].
    pub identifier: String,
}

impl SubscribeCommand {
    /// Build the subscribe command for `handle` on [`MESSAGES_CHANNEL`].
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Encode`] if the identifier cannot be serialized.
    pub fn for_handle(handle: &SubscriptionHandle) -> Result<Self, FrameError> {
        let identifier = ChannelIdentifier {
            id: handle.as_str().to_string(),
            channel: MESSAGES_CHANNEL.to_string(),
        };
        Ok(Self {
            command: SUBSCRIBE_COMMAND.to_string(),
            identifier: serde_json::to_string(&identifier).map_err(FrameError::Encode)?,
        })
    }

    /// Decode the nested identifier document.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] if `identifier` is not valid JSON
    /// of the expected shape.
    pub fn channel_identifier(&self) -> Result<ChannelIdentifier, FrameError> {
        serde_json::from_str(&self.identifier).map_err(FrameError::Malformed)
    }
}

/// Encode the identify frame for `handle` as socket text.
///
/// # Errors
///
/// Returns [`FrameError::Encode`] if serialization fails.
pub fn encode_identify(handle: &SubscriptionHandle) -> Result<String, FrameError> {
    let command = SubscribeCommand::for_handle(handle)?;
    serde_json::to_string(&command).map_err(FrameError::Encode)
}

/// Control traffic that carries no chat content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// Liveness heartbeat.
    Ping,
    /// Connection-level acknowledgment.
    Welcome,
    /// Subscription-level acknowledgment.
    ConfirmSubscription,
}

impl ControlFrame {
    /// Map a `type` discriminator to a control frame, if it is one.
    #[must_use]
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "ping" => Some(Self::Ping),
            "welcome" => Some(Self::Welcome),
            "confirm_subscription" => Some(Self::ConfirmSubscription),
            _ => None,
        }
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Ignored control traffic.
    Control(ControlFrame),
    /// One new chat message.
    Data(Message),
}

/// Envelope shape shared by all inbound frames.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

/// Classify one inbound text frame.
///
/// The `type` field is checked before `message`, since control frames may
/// also carry a `message` (a ping carries a timestamp there).
///
/// # Errors
///
/// - [`FrameError::Malformed`] if the text is not a JSON object.
/// - [`FrameError::MissingMessage`] for a non-control frame without `message`.
/// - [`FrameError::InvalidMessage`] if `message` is not a chat message.
pub fn decode_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    let raw: RawFrame = serde_json::from_str(text).map_err(FrameError::Malformed)?;

    if let Some(control) = raw.kind.as_deref().and_then(ControlFrame::from_type) {
        return Ok(InboundFrame::Control(control));
    }

    let Some(payload) = raw.message else {
        return Err(FrameError::MissingMessage { kind: raw.kind });
    };

    serde_json::from_value(payload)
        .map(InboundFrame::Data)
        .map_err(FrameError::InvalidMessage)
}
