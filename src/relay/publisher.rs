//! Destination channel sender
//!
//! One attempt per forward. A failed send is logged and handed back as a
//! [`PublishError`]; nothing here retries.

use crate::error::PublishError;
use crate::telegram::{BotApi, SentMessage};
use std::sync::Arc;

pub struct ChannelPublisher<A: BotApi + ?Sized> {
    api: Arc<A>,
}

impl<A: BotApi + ?Sized> ChannelPublisher<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub async fn publish(&self, destination: &str, text: &str) -> Result<SentMessage, PublishError> {
        match self.api.send_message(destination, text).await {
            Ok(sent) => {
                tracing::debug!(destination, message_id = sent.message_id, "Message published");
                Ok(sent)
            }
            Err(e) => {
                tracing::error!(destination, error = %e, "Error forwarding signal");
                Err(PublishError {
                    destination: destination.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
