//! Raw wire payload shapes.
//!
//! Everything is `Option` on purpose: external webhooks and sidecar frames
//! are duck-typed JSON, so we parse permissively at the boundary and only
//! convert to the strict domain type after validation. An unrecognized
//! shape is a normalizer `None`, never a crash.

use serde::{Deserialize, Serialize};

/// Envelope of a provider push: `{ "event": "messages.upsert", "data": … }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawUpsertPayload {
    pub event: Option<String>,
    pub data: Option<RawMessageFrame>,
}

/// Event marker for message insertion.
pub const MESSAGES_UPSERT: &str = "messages.upsert";

/// One message frame as the transport delivers it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessageFrame {
    pub key: Option<RawKey>,
    pub push_name: Option<String>,
    pub message: Option<RawMessageContent>,
    /// Provider-native epoch seconds.
    pub message_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawKey {
    pub remote_jid: Option<String>,
    pub id: Option<String>,
    pub from_me: Option<bool>,
}

/// Message body variants, in extraction priority order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessageContent {
    /// Plain text.
    pub conversation: Option<String>,
    /// Reply / link-preview text.
    pub extended_text_message: Option<RawExtendedText>,
    pub image_message: Option<RawMediaMessage>,
    pub video_message: Option<RawMediaMessage>,
    pub document_message: Option<RawMediaMessage>,
    pub audio_message: Option<RawMediaMessage>,
    pub sticker_message: Option<RawMediaMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawExtendedText {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMediaMessage {
    pub caption: Option<String>,
}

impl RawMessageContent {
    /// Extract body text using the type-priority chain: conversation →
    /// extended text → media caption → bracketed placeholder naming the
    /// unsupported type.
    pub fn extract_text(&self) -> String {
        if let Some(text) = self.conversation.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }
        if let Some(text) = self
            .extended_text_message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .filter(|t| !t.is_empty())
        {
            return text.to_string();
        }
        for (media, kind) in [
            (&self.image_message, "image"),
            (&self.video_message, "video"),
            (&self.document_message, "document"),
        ] {
            if let Some(m) = media {
                return match m.caption.as_deref().filter(|c| !c.is_empty()) {
                    Some(caption) => caption.to_string(),
                    None => format!("[{kind} message]"),
                };
            }
        }
        if self.audio_message.is_some() {
            return "[audio message]".into();
        }
        if self.sticker_message.is_some() {
            return "[sticker message]".into();
        }
        "[unsupported message]".into()
    }
}
