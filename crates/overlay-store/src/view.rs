//! Rendered view of the store.

use serde::Serialize;
use serde_json::{Map, Value};

use overlay_core::{Message, MessageId, MessageKey};

/// One message as handed to a renderer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DisplayMessage {
    /// Store identity.
    pub key: MessageKey,
    /// Server id.
    pub id: Option<MessageId>,
    /// Author name.
    pub user: String,
    /// Sanitized text.
    pub text: String,
    /// `style_<type>` tag.
    pub style: String,
    /// Decayed.
    pub old: bool,
    /// Private/highlighted.
    pub pm: bool,
    /// Pass-through payload fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys stamped by the store; pass-through fields with these names are dropped.
const STAMPED_KEYS: [&str; 3] = ["key", "style", "old"];

impl DisplayMessage {
    pub(crate) fn new(message: &Message, text: String) -> Self {
        let extra = message
            .extra
            .iter()
            .filter(|(name, _)| !STAMPED_KEYS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            key: message.key,
            id: message.id.clone(),
            user: message.user.clone(),
            text,
            style: message.style_tag.clone(),
            old: message.is_old,
            pm: message.pm,
            extra,
        }
    }
}
