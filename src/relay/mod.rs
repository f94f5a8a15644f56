//! Message relay pipeline
//!
//! ```text
//! InboundMessage → source filter → SignalMatcher → formatter → ChannelPublisher
//! ```
//!
//! Every stage is per-message and stateless; a failure in one message never
//! reaches the next.

pub mod formatter;
pub mod matcher;
pub mod publisher;

pub use matcher::SignalMatcher;
pub use publisher::ChannelPublisher;

use crate::error::PublishError;
use crate::telegram::{BotApi, InboundMessage};
use chrono::Local;
use std::sync::Arc;

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Not from the source chat
    Ignored,
    /// From the source chat but no pattern matched
    NoSignal,
    Forwarded { message_id: i64 },
    Dropped(PublishError),
}

pub struct Relay<A: BotApi + ?Sized> {
    matcher: SignalMatcher,
    publisher: ChannelPublisher<A>,
    source_chat_id: String,
    destination: String,
}

impl<A: BotApi + ?Sized> Relay<A> {
    pub fn new(
        api: Arc<A>,
        matcher: SignalMatcher,
        source_chat_id: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            matcher,
            publisher: ChannelPublisher::new(api),
            source_chat_id: source_chat_id.into(),
            destination: destination.into(),
        }
    }

    pub fn source_chat_id(&self) -> &str {
        &self.source_chat_id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Run one message through the pipeline
    pub async fn process(&self, message: &InboundMessage) -> RelayOutcome {
        if message.source_chat_id != self.source_chat_id {
            tracing::trace!(
                chat_id = %message.source_chat_id,
                "Ignoring message from other chat"
            );
            return RelayOutcome::Ignored;
        }

        let body = message.body();
        let Some(pattern) = self.matcher.matched_pattern(Some(body)) else {
            tracing::debug!(message_id = message.message_id, "No signal in message");
            return RelayOutcome::NoSignal;
        };

        tracing::info!(
            message_id = message.message_id,
            pattern,
            "Trading signal detected: {}...",
            preview(body, 100)
        );

        let text = formatter::format(message, &Local::now());

        match self.publisher.publish(&self.destination, &text).await {
            Ok(sent) => {
                tracing::info!(
                    message_id = sent.message_id,
                    "Signal forwarded successfully: {}...",
                    preview(body, 50)
                );
                RelayOutcome::Forwarded {
                    message_id: sent.message_id,
                }
            }
            Err(e) => RelayOutcome::Dropped(e),
        }
    }
}

/// First `max` characters of `text`
pub fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
