//! Test doubles shared by unit tests

use crate::config::SessionConfig;
use crate::error::{BotError, Result};
use crate::monitor::StatusReporter;
use crate::relay::{Relay, SignalMatcher};
use crate::session::{PollingSession, SessionState};
use crate::telegram::{BotApi, BotIdentity, SentMessage, Update};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub const SOURCE: &str = "-1002845747985";
pub const DEST: &str = "-1002697085169";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetMe,
    Drain { offset: Option<i64> },
    Poll { offset: Option<i64> },
    Send { chat_id: String, text: String },
}

/// Scripted Bot API.
///
/// `getUpdates` with `timeout == 0` (drain) pops `drains` and returns an
/// empty batch once it runs out. Long polls pop `polls` and wait forever
/// once it runs out, like an idle chat. `getMe` pops `me` and succeeds by
/// default. Every call is recorded with the (tokio) instant it was made.
#[derive(Default)]
pub struct ScriptedApi {
    pub me: Mutex<VecDeque<Result<BotIdentity>>>,
    pub drains: Mutex<VecDeque<Result<Vec<Update>>>>,
    pub polls: Mutex<VecDeque<Result<Vec<Update>>>>,
    pub sends: Mutex<VecDeque<Result<SentMessage>>>,
    pub calls: Mutex<Vec<(Call, Instant)>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_me(&self, result: Result<BotIdentity>) {
        self.me.lock().push_back(result);
    }

    pub fn push_drain(&self, result: Result<Vec<Update>>) {
        self.drains.lock().push_back(result);
    }

    pub fn push_poll(&self, result: Result<Vec<Update>>) {
        self.polls.lock().push_back(result);
    }

    pub fn push_send(&self, result: Result<SentMessage>) {
        self.sends.lock().push_back(result);
    }

    pub fn calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().clone()
    }

    pub fn instants_of(&self, pred: impl Fn(&Call) -> bool) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(c, _)| pred(c))
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|(c, _)| match c {
                Call::Send { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push((call, Instant::now()));
    }
}

pub fn identity() -> BotIdentity {
    BotIdentity {
        id: 42,
        first_name: "Relay".into(),
        username: Some("relay_bot".into()),
    }
}

#[async_trait]
impl BotApi for ScriptedApi {
    async fn get_me(&self) -> Result<BotIdentity> {
        self.record(Call::GetMe);
        let next = self.me.lock().pop_front();
        next.unwrap_or_else(|| Ok(identity()))
    }

    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        if timeout_secs == 0 {
            self.record(Call::Drain { offset });
            let next = self.drains.lock().pop_front();
            return next.unwrap_or_else(|| Ok(Vec::new()));
        }

        self.record(Call::Poll { offset });
        let next = self.polls.lock().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<SentMessage> {
        self.record(Call::Send {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });
        let next = self.sends.lock().pop_front();
        next.unwrap_or(Ok(SentMessage { message_id: 1 }))
    }
}

/// Update carrying a text message from `chat`
pub fn text_update(update_id: i64, chat: &str, text: &str) -> Update {
    let json = serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "chat": {"id": chat.parse::<i64>().unwrap_or(0)},
            "date": 1700000000,
            "text": text,
        }
    });
    serde_json::from_value(json).unwrap()
}

pub fn conflict_error() -> BotError {
    BotError::api(
        Some(409),
        "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running",
    )
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        poll_timeout: Duration::from_secs(30),
        quiescence: Duration::from_secs(1),
        drain_on_start: true,
        channel_probe: false,
    }
}

/// Session wired to `api`, plus the reporter reading its state
pub fn session(
    api: Arc<ScriptedApi>,
    config: SessionConfig,
) -> (PollingSession<ScriptedApi>, Arc<StatusReporter>) {
    let (state_tx, state_rx) = watch::channel(SessionState::Stopped);
    let reporter = Arc::new(StatusReporter::new(state_rx));
    let relay = Relay::new(
        api.clone(),
        SignalMatcher::new().unwrap(),
        SOURCE,
        DEST,
    );
    let session = PollingSession::new(api, relay, config, state_tx, reporter.clone());
    (session, reporter)
}
