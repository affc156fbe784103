//! Chat message entities.
//!
//! [`MessagePayload`] is the wire shape of a chat frame's `payload`.
//! [`Message`] is the stored entity: the payload plus the fields stamped on
//! arrival (style tag, arrival time, decay flag, store key).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{MessageId, MessageKey};

/// Token-to-image substitution rule attached to a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    /// Token to replace in the message text.
    pub id: String,
    /// Image URL substituted for the token.
    pub url: String,
}

/// Wire payload of a chat frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Server id. System messages may not carry one.
    #[serde(default)]
    pub id: Option<MessageId>,
    /// Author name.
    #[serde(default)]
    pub user: String,
    /// Message text, already escaped by the server.
    #[serde(default)]
    pub text: String,
    /// Emote substitutions for `text`.
    #[serde(default)]
    pub emotes: Vec<Emote>,
    /// Private/highlighted message flag.
    #[serde(default)]
    pub pm: bool,
    /// Remaining payload fields (badges, platform, levels, ...) passed
    /// through to renderers untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message held by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Store identity; assigned on insertion.
    pub key: MessageKey,
    /// Server id.
    pub id: Option<MessageId>,
    /// Author name.
    pub user: String,
    /// Current text. Replaced in place by replace commands.
    pub text: String,
    /// Current emotes. Cleared by replace commands.
    pub emotes: Vec<Emote>,
    /// `style_<type>` tag derived from the frame type.
    pub style_tag: String,
    /// When the frame was received.
    pub arrival_time: DateTime<Utc>,
    /// Set once by the decay sweep, never cleared.
    pub is_old: bool,
    /// Private/highlighted message flag.
    pub pm: bool,
    /// Pass-through payload fields.
    pub extra: Map<String, Value>,
}

impl Message {
    /// Stamp a freshly received payload.
    pub fn arrived(payload: MessagePayload, message_type: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: MessageKey::default(),
            id: payload.id,
            user: payload.user,
            text: payload.text,
            emotes: payload.emotes,
            style_tag: format!("style_{message_type}"),
            arrival_time: now,
            is_old: false,
            pm: payload.pm,
            extra: payload.extra,
        }
    }

    /// Case-insensitive author match against an already lowercased name.
    pub fn user_matches(&self, lowercase_name: &str) -> bool {
        self.user.to_lowercase() == lowercase_name
    }
}
