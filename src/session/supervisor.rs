//! Restart controller
//!
//! The remote error text is the only signal about why a poll failed, so
//! classification is by substring. Only two classes restart the session;
//! everything else is left to the session's transient back-off.

use super::{PollingSession, SessionCommand};
use crate::error::BotError;
use crate::telegram::BotApi;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const CONFLICT_MARKER: &str = "409 Conflict";
const MULTI_INSTANCE_MARKER: &str = "terminated by other getUpdates";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Another poller holds the credential
    Conflict,
    /// Our poll was cut off by another process polling
    MultiInstance,
    Unclassified,
}

impl ErrorClass {
    /// Conflict is checked first; Telegram's 409 text carries both markers.
    pub fn classify(message: &str) -> Self {
        if message.contains(CONFLICT_MARKER) {
            ErrorClass::Conflict
        } else if message.contains(MULTI_INSTANCE_MARKER) {
            ErrorClass::MultiInstance
        } else {
            ErrorClass::Unclassified
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    None,
    RestartAfter(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
    pub conflict_delay: Duration,
    pub multi_instance_delay: Duration,
    /// Growth per consecutive failure of one class; 1.0 holds the delay steady
    pub backoff_multiplier: f64,
    /// Failures further apart than this start a new streak
    pub window: Duration,
    /// Cap for grown delays; never shortens a base delay
    pub max_delay: Duration,
    /// `None` keeps unclassified errors out of the restart path
    pub unclassified_delay: Option<Duration>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            conflict_delay: Duration::from_secs(5),
            multi_instance_delay: Duration::from_secs(10),
            backoff_multiplier: 1.0,
            window: Duration::from_secs(300),
            max_delay: Duration::from_secs(300),
            unclassified_delay: None,
        }
    }
}

impl RestartPolicy {
    pub fn base_delay(&self, class: ErrorClass) -> Option<Duration> {
        match class {
            ErrorClass::Conflict => Some(self.conflict_delay),
            ErrorClass::MultiInstance => Some(self.multi_instance_delay),
            ErrorClass::Unclassified => self.unclassified_delay,
        }
    }

    /// Delay for the `attempt`-th consecutive failure (1-based)
    pub fn delay_for(&self, base: Duration, attempt: u32) -> Duration {
        if attempt <= 1 || self.backoff_multiplier <= 1.0 {
            return base;
        }
        let exp = (attempt - 1).min(64) as i32;
        let cap = self.max_delay.max(base).as_secs_f64();
        let secs = (base.as_secs_f64() * self.backoff_multiplier.powi(exp)).min(cap);
        Duration::from_secs_f64(secs).max(base)
    }
}

#[derive(Debug, Clone, Copy)]
struct Streak {
    class: ErrorClass,
    count: u32,
    last_at: Instant,
}

/// What the run loop does next
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Start,
    Poll,
    Wait(Duration, Resume),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resume {
    Start,
    Poll,
}

pub struct Supervisor {
    policy: RestartPolicy,
    streak: Option<Streak>,
}

impl Supervisor {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            streak: None,
        }
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Classify `error` and pick a restart delay
    pub fn on_error(&mut self, error: &BotError) -> RestartDecision {
        let class = ErrorClass::classify(&error.to_string());
        let Some(base) = self.policy.base_delay(class) else {
            return RestartDecision::None;
        };

        let now = Instant::now();
        let count = match self.streak {
            Some(s) if s.class == class && now.duration_since(s.last_at) <= self.policy.window => {
                s.count.saturating_add(1)
            }
            _ => 1,
        };
        self.streak = Some(Streak {
            class,
            count,
            last_at: now,
        });

        RestartDecision::RestartAfter(self.policy.delay_for(base, count))
    }

    /// Drive `session` until a shutdown command arrives or every command
    /// sender is dropped.
    pub async fn run<A>(mut self, mut session: PollingSession<A>, mut commands: mpsc::Receiver<SessionCommand>)
    where
        A: BotApi + ?Sized,
    {
        let mut step = Step::Start;

        loop {
            step = match step {
                Step::Wait(delay, resume) => {
                    tokio::select! {
                        biased;
                        cmd = commands.recv() => match cmd {
                            Some(SessionCommand::Restart) => {
                                tracing::info!("Restart requested by operator");
                                session.begin_restart();
                                Step::Start
                            }
                            Some(SessionCommand::Shutdown) | None => break,
                        },
                        _ = tokio::time::sleep(delay) => match resume {
                            Resume::Start => Step::Start,
                            Resume::Poll => Step::Poll,
                        },
                    }
                }
                Step::Start => {
                    tokio::select! {
                        biased;
                        cmd = commands.recv() => match cmd {
                            Some(SessionCommand::Restart) => {
                                tracing::info!("Restart requested by operator while starting");
                                session.begin_restart();
                                Step::Start
                            }
                            Some(SessionCommand::Shutdown) | None => break,
                        },
                        result = session.start() => match result {
                            Ok(_) => Step::Poll,
                            Err(e) => self.recover(&mut session, &e),
                        },
                    }
                }
                Step::Poll => {
                    tokio::select! {
                        biased;
                        cmd = commands.recv() => match cmd {
                            Some(SessionCommand::Restart) => {
                                tracing::info!("Restart requested by operator");
                                session.begin_restart();
                                Step::Start
                            }
                            Some(SessionCommand::Shutdown) | None => break,
                        },
                        next = session.next_message() => match next {
                            Ok(message) => {
                                session.handle(&message).await;
                                Step::Poll
                            }
                            Err(e) => self.recover(&mut session, &e),
                        },
                    }
                }
            };
        }

        // Already acknowledged upstream; forward before letting go
        for message in session.take_pending() {
            session.handle(&message).await;
        }
        session.stop();
        tracing::info!("Supervisor stopped");
    }

    fn recover<A>(&mut self, session: &mut PollingSession<A>, error: &BotError) -> Step
    where
        A: BotApi + ?Sized,
    {
        session.reporter().record_error(&error.to_string());

        match self.on_error(error) {
            RestartDecision::RestartAfter(delay) => {
                tracing::warn!(
                    error = %error,
                    delay_secs = delay.as_secs_f64(),
                    "Polling conflict, restarting after delay"
                );
                session.begin_restart();
                Step::Wait(delay, Resume::Start)
            }
            RestartDecision::None if session.is_active() => {
                let backoff = session.transient_backoff();
                tracing::warn!(
                    error = %error,
                    backoff_ms = backoff.as_millis() as u64,
                    "Polling error"
                );
                Step::Wait(backoff, Resume::Poll)
            }
            RestartDecision::None => {
                let backoff = session.transient_backoff();
                tracing::error!(
                    error = %error,
                    backoff_ms = backoff.as_millis() as u64,
                    "Failed to start polling, retrying"
                );
                session.begin_restart();
                Step::Wait(backoff, Resume::Start)
            }
        }
    }
}
