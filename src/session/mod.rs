//! Long-poll session lifecycle
//!
//! [`PollingSession`] owns the connection to `getUpdates`, the update offset
//! and the process-wide [`SessionState`]. It never restarts itself: errors
//! are returned to the [`Supervisor`], which is the only caller of
//! [`PollingSession::start`] and [`PollingSession::stop`].
//!
//! ```text
//! Stopped → Starting → Draining → Polling ─(classified error)→ Restarting
//!              ↑                                                   │
//!              └──────────────────── after delay ──────────────────┘
//! ```

pub mod supervisor;

pub use supervisor::{ErrorClass, RestartDecision, RestartPolicy, Supervisor};

use crate::config::SessionConfig;
use crate::error::{BotError, Result};
use crate::monitor::StatusReporter;
use crate::relay::{Relay, RelayOutcome};
use crate::telegram::{BotApi, BotIdentity, InboundMessage};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

const TRANSIENT_BACKOFF_BASE: Duration = Duration::from_secs(1);
const TRANSIENT_BACKOFF_MAX: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Starting,
    Polling,
    Draining,
    Restarting,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Polling => "polling",
            SessionState::Draining => "draining",
            SessionState::Restarting => "restarting",
        };
        f.write_str(name)
    }
}

/// Out-of-band requests for the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Restart,
    Shutdown,
}

pub struct PollingSession<A: BotApi + ?Sized> {
    api: Arc<A>,
    relay: Relay<A>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    reporter: Arc<StatusReporter>,
    /// Next `getUpdates` offset; survives restarts
    offset: Option<i64>,
    /// Acknowledged upstream but not yet handled
    pending: VecDeque<InboundMessage>,
    /// A poller handle is open against the credential
    active: bool,
    closed_at: Option<Instant>,
    transient_failures: u32,
}

impl<A: BotApi + ?Sized> PollingSession<A> {
    pub fn new(
        api: Arc<A>,
        relay: Relay<A>,
        config: SessionConfig,
        state: watch::Sender<SessionState>,
        reporter: Arc<StatusReporter>,
    ) -> Self {
        state.send_replace(SessionState::Stopped);
        Self {
            api,
            relay,
            config,
            state,
            reporter,
            offset: None,
            pending: VecDeque::new(),
            active: false,
            closed_at: None,
            transient_failures: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn reporter(&self) -> &Arc<StatusReporter> {
        &self.reporter
    }

    fn set_state(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "Session state changed");
        }
    }

    fn close_handle(&mut self) {
        if self.active {
            self.active = false;
            self.closed_at = Some(Instant::now());
        }
    }

    /// Open a polling session.
    ///
    /// Closes a still-active handle first and keeps at least the quiescence
    /// pause between closing one poller and opening the next, then drains
    /// stale updates and performs the `getMe` handshake.
    pub async fn start(&mut self) -> Result<BotIdentity> {
        if self.active {
            tracing::warn!("Previous poller still active, stopping it before restart");
            self.close_handle();
        }
        self.set_state(SessionState::Starting);

        if let Some(closed_at) = self.closed_at {
            let elapsed = closed_at.elapsed();
            if elapsed < self.config.quiescence {
                let wait = self.config.quiescence - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Waiting for previous poller to settle");
                tokio::time::sleep(wait).await;
            }
        }

        match self.open().await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                // drain requests count as a connection against the credential
                self.closed_at = Some(Instant::now());
                Err(e)
            }
        }
    }

    async fn open(&mut self) -> Result<BotIdentity> {
        if self.config.drain_on_start {
            self.set_state(SessionState::Draining);
            self.drain_pending().await?;
        }

        let identity = self.api.get_me().await?;
        self.active = true;
        self.transient_failures = 0;
        self.set_state(SessionState::Polling);
        self.reporter.set_identity(identity.clone());

        tracing::info!(bot = %identity.display_name(), "Polling started");
        Ok(identity)
    }

    /// Fetch and discard everything queued upstream, advancing the offset
    /// past each item. Returns the number of discarded updates.
    pub async fn drain_pending(&mut self) -> Result<usize> {
        let mut discarded = 0;
        loop {
            let updates = self.api.get_updates(self.offset, 0).await?;
            let Some(last) = updates.last() else {
                break;
            };
            self.offset = Some(last.update_id + 1);
            discarded += updates.len();
        }

        if discarded > 0 {
            tracing::info!(discarded, "Discarded stale updates queued before start");
        }
        Ok(discarded)
    }

    /// Close the poller and move to `Stopped`. Calling it again is a no-op.
    pub fn stop(&mut self) {
        let was = self.state();
        self.close_handle();
        if was != SessionState::Stopped {
            self.set_state(SessionState::Stopped);
            tracing::info!("Polling stopped");
        }
    }

    /// Close the poller ahead of a supervised restart
    pub fn begin_restart(&mut self) {
        self.close_handle();
        self.set_state(SessionState::Restarting);
        self.reporter.record_restart();
    }

    /// Next inbound message, long-polling when nothing is buffered.
    ///
    /// Cancel-safe: dropping the future while it waits on the network
    /// loses nothing, because the offset only moves after a batch arrives.
    pub async fn next_message(&mut self) -> Result<InboundMessage> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }
            if !self.active {
                return Err(BotError::Internal(format!(
                    "session is {}, not polling",
                    self.state()
                )));
            }

            let updates = self
                .api
                .get_updates(self.offset, self.config.poll_timeout.as_secs())
                .await?;
            self.transient_failures = 0;

            for update in updates {
                self.offset = Some(update.update_id + 1);
                if let Some(message) = update.into_inbound() {
                    self.pending.push_back(message);
                }
            }
        }
    }

    /// Messages already acknowledged upstream but not handled yet
    pub fn take_pending(&mut self) -> Vec<InboundMessage> {
        self.pending.drain(..).collect()
    }

    /// Relay one message. Failures are logged and counted, never raised.
    pub async fn handle(&self, message: &InboundMessage) -> RelayOutcome {
        let outcome = self.relay.process(message).await;
        self.reporter.record(&outcome);
        outcome
    }

    /// Delay before retrying after an unclassified error: exponential from
    /// 1s to 60s with up to 20% jitter. Reset by any successful poll.
    pub fn transient_backoff(&mut self) -> Duration {
        let exp = self.transient_failures.min(6);
        self.transient_failures = self.transient_failures.saturating_add(1);

        let base = (TRANSIENT_BACKOFF_BASE * 2u32.pow(exp)).min(TRANSIENT_BACKOFF_MAX);
        let jitter_range = base.as_millis() as u64 / 5;
        let jitter = rand::rng().random_range(0..=jitter_range);
        base + Duration::from_millis(jitter)
    }

    /// One-off probe that the bot can post to the destination
    pub async fn probe_channel(&self) -> Result<()> {
        self.api
            .send_message(self.relay.destination(), "Bot test - can you see this?")
            .await?;
        Ok(())
    }
}
