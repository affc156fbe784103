//! Inbound frame decoding.
//!
//! A frame is JSON text `{"type": string, "payload": object}`. Frames whose
//! `type` is the literal `"command"` carry a [`Command`]; any other type tags
//! a chat message whose payload is a [`MessagePayload`]. Frames without a
//! usable `type` are [`Inbound::Ignored`].

use serde::Deserialize;
use serde_json::Value;

use crate::errors::FrameError;
use crate::ids::MessageId;
use crate::message::MessagePayload;

/// Frame type that routes to the command vocabulary.
pub const COMMAND_TYPE: &str = "command";

/// Classified inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// No `type`: dropped without error.
    Ignored,
    /// A mutation command.
    Command(Command),
    /// A chat message of the given display type.
    Chat {
        /// Display type, e.g. `"message"` or `"system"`.
        message_type: String,
        /// Decoded payload.
        payload: MessagePayload,
    },
}

/// Server-issued command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Discard all state and start over.
    Reload,
    /// Remove every message by these authors (case-insensitive).
    RemoveByUsers {
        /// Author names.
        users: Vec<String>,
    },
    /// Remove every message with one of these ids.
    RemoveByIds {
        /// Server ids.
        messages: Vec<MessageId>,
    },
    /// Replace the text of every message by these authors.
    ReplaceByUsers {
        /// Author names.
        users: Vec<String>,
        /// Replacement text.
        text: String,
    },
    /// Replace the text of every message with one of these ids.
    ReplaceByIds {
        /// Server ids.
        messages: Vec<MessageId>,
        /// Replacement text.
        text: String,
    },
    /// Name outside the vocabulary.
    Unknown {
        /// The unrecognized name.
        name: String,
    },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: Value,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct UserOperands {
    #[serde(default)]
    users: Vec<String>,
}

#[derive(Deserialize)]
struct IdOperands {
    #[serde(default)]
    messages: Vec<MessageId>,
}

#[derive(Deserialize)]
struct TextOperand {
    text: Option<String>,
}

impl Inbound {
    /// Decode raw frame text.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        Self::from_parts(&raw.kind, raw.payload)
    }

    /// Classify an already decoded `type`/`payload` pair.
    pub fn from_parts(kind: &Value, payload: Value) -> Result<Self, FrameError> {
        let kind = match kind.as_str() {
            Some(k) if !k.is_empty() => k,
            _ => return Ok(Self::Ignored),
        };

        if kind == COMMAND_TYPE {
            return Command::parse(&payload).map(Self::Command);
        }

        let payload: MessagePayload = serde_json::from_value(payload)?;
        Ok(Self::Chat {
            message_type: kind.to_owned(),
            payload,
        })
    }
}

impl Command {
    /// Decode a command payload.
    pub fn parse(payload: &Value) -> Result<Self, FrameError> {
        let name = payload
            .get("command")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingField("command"))?;

        Ok(match name {
            "reload" => Self::Reload,
            "remove_by_users" => Self::RemoveByUsers {
                users: UserOperands::deserialize(payload)?.users,
            },
            "remove_by_ids" => Self::RemoveByIds {
                messages: IdOperands::deserialize(payload)?.messages,
            },
            "replace_by_users" => Self::ReplaceByUsers {
                users: UserOperands::deserialize(payload)?.users,
                text: replacement_text(payload)?,
            },
            "replace_by_ids" => Self::ReplaceByIds {
                messages: IdOperands::deserialize(payload)?.messages,
                text: replacement_text(payload)?,
            },
            other => Self::Unknown {
                name: other.to_owned(),
            },
        })
    }

    /// Wire name of the command.
    pub fn name(&self) -> &str {
        match self {
            Self::Reload => "reload",
            Self::RemoveByUsers { .. } => "remove_by_users",
            Self::RemoveByIds { .. } => "remove_by_ids",
            Self::ReplaceByUsers { .. } => "replace_by_users",
            Self::ReplaceByIds { .. } => "replace_by_ids",
            Self::Unknown { name } => name,
        }
    }
}

fn replacement_text(payload: &Value) -> Result<String, FrameError> {
    TextOperand::deserialize(payload)?
        .text
        .ok_or(FrameError::MissingField("text"))
}
