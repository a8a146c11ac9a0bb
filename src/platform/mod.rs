pub mod telegram;

use serde::Deserialize;

/// The subset of a Telegram `Update` the bridge looks at. Unknown fields are
/// ignored; the raw body is kept separately for forwarding.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// An update the bridge acts on: exactly one of message or callback.
#[derive(Debug, Clone)]
pub enum InboundUpdate {
    Message(Message),
    Callback(CallbackQuery),
}

impl Update {
    /// Parse a webhook body. `None` for non-JSON bodies and for updates that
    /// carry neither a message nor a callback query.
    pub fn parse(body: &[u8]) -> Option<InboundUpdate> {
        let update: Update = serde_json::from_slice(body).ok()?;
        if let Some(message) = update.message {
            return Some(InboundUpdate::Message(message));
        }
        update.callback_query.map(InboundUpdate::Callback)
    }
}

impl InboundUpdate {
    /// Chat to reply into. Callbacks on inaccessible messages fall back to the
    /// sender's private chat.
    pub fn chat_id(&self) -> i64 {
        match self {
            InboundUpdate::Message(msg) => msg.chat.id,
            InboundUpdate::Callback(cb) => cb
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(cb.from.id),
        }
    }

    pub fn sender(&self) -> Option<&User> {
        match self {
            InboundUpdate::Message(msg) => msg.from.as_ref(),
            InboundUpdate::Callback(cb) => Some(&cb.from),
        }
    }

    /// Id used for per-user backend records.
    pub fn user_id(&self) -> i64 {
        self.sender().map(|u| u.id).unwrap_or_else(|| self.chat_id())
    }

    /// Message text, empty for callbacks and non-text messages.
    pub fn text(&self) -> &str {
        match self {
            InboundUpdate::Message(msg) => msg.text.as_deref().unwrap_or(""),
            InboundUpdate::Callback(_) => "",
        }
    }

    /// Human-readable summary for the backend event log.
    pub fn summary(&self) -> String {
        let text = self.text();
        if !text.is_empty() {
            return text.to_string();
        }
        match self {
            InboundUpdate::Message(Message {
                document: Some(doc),
                ..
            }) => format!("File: {}", doc.file_name.as_deref().unwrap_or("")),
            _ => "Update".to_string(),
        }
    }
}
