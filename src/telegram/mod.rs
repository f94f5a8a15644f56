//! Telegram Bot API client
//!
//! The session and publisher only see the [`BotApi`] trait; [`TelegramApi`]
//! is the reqwest-backed implementation.

pub mod types;

pub use types::{BotIdentity, InboundMessage, SentMessage, Update};

use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use types::{ApiResponse, GetUpdatesRequest, SendMessageRequest};

/// Updates the relay asks Telegram for
const MESSAGE_UPDATES: &[&str] = &["message"];
const MESSAGE_AND_CHANNEL_UPDATES: &[&str] = &["message", "channel_post"];

/// Extra time the HTTP request may take beyond the long-poll timeout
const REQUEST_GRACE: Duration = Duration::from_secs(10);

/// The three Bot API calls the relay needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Identify the bot; used as the session handshake
    async fn get_me(&self) -> Result<BotIdentity>;

    /// Long-poll for updates starting at `offset`
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>>;

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<SentMessage>;
}

/// Bot API over HTTPS
pub struct TelegramApi {
    http: Client,
    base_url: String,
    relay_channel_posts: bool,
}

impl TelegramApi {
    pub fn new(config: &TelegramConfig, poll_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(poll_timeout + REQUEST_GRACE)
            .build()?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_base_url.trim_end_matches('/'),
                config.bot_token
            ),
            relay_channel_posts: config.relay_channel_posts,
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            let description = response
                .description
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(BotError::api(response.error_code, description));
        }

        response
            .result
            .ok_or_else(|| BotError::Internal(format!("{} returned ok without a result", method)))
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn get_me(&self) -> Result<BotIdentity> {
        self.call("getMe", &serde_json::json!({})).await
    }

    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let allowed_updates = if self.relay_channel_posts {
            MESSAGE_AND_CHANNEL_UPDATES
        } else {
            MESSAGE_UPDATES
        };
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates,
        };
        let mut updates: Vec<Update> = self.call("getUpdates", &request).await?;

        // the offset still has to move past them, so keep the update itself
        if !self.relay_channel_posts {
            for update in &mut updates {
                update.channel_post = None;
            }
        }
        Ok(updates)
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<SentMessage> {
        self.call("sendMessage", &SendMessageRequest { chat_id, text })
            .await
    }
}
