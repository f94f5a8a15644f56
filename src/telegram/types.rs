//! Serde types for the Telegram Bot API
//!
//! Only the fields the relay reads are modelled; everything else is ignored.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Envelope around every Bot API reply
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    /// Unix seconds
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub title: Option<String>,
}

/// The bot's own account, from `getMe`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

impl BotIdentity {
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
}

/// One inbound chat message, detached from the update that carried it
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub update_id: i64,
    pub message_id: i64,
    /// Decimal rendering of the chat id; compared as a string
    pub source_chat_id: String,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Text, else caption, else the empty string
    pub fn body(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.caption.as_deref())
            .unwrap_or("")
    }
}

impl Update {
    /// Extract the message carried by this update, if any
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let update_id = self.update_id;
        let msg = self.message.or(self.channel_post)?;
        let received_at = Utc
            .timestamp_opt(msg.date, 0)
            .single()
            .filter(|_| msg.date > 0)
            .unwrap_or_else(Utc::now);

        Some(InboundMessage {
            update_id,
            message_id: msg.message_id,
            source_chat_id: msg.chat.id.to_string(),
            text: msg.text,
            caption: msg.caption,
            received_at,
        })
    }
}
