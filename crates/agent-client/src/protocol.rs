//! Wire shapes of the turn-based run protocol.

use serde::{Deserialize, Serialize};

/// `POST {base_url}/run` request body.
#[derive(Debug, Serialize)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    pub streaming: bool,
}

#[derive(Debug, Serialize)]
pub struct NewMessage {
    pub parts: Vec<MessagePart>,
    pub role: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One event of the agent's turn stream (the reply is an ordered array of
/// these).
#[derive(Debug, Clone, Deserialize)]
pub struct TurnEvent {
    #[serde(default)]
    pub content: Option<TurnContent>,
    #[serde(default, rename = "invocationId")]
    pub invocation_id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub actions: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnContent {
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Reply text = concatenated part text of the **last** model-authored event.
pub fn reply_text(events: &[TurnEvent]) -> Option<String> {
    let event = events
        .iter()
        .rev()
        .find(|e| e.author.as_deref() == Some("model"))?;
    let content = event.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.is_empty() { None } else { Some(text) }
}
