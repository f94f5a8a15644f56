//! Liveness and status reporting
//!
//! [`StatusReporter`] is read by the health endpoint and written by the
//! polling session. Session state arrives through a `watch` channel whose
//! only sender lives in the session.

pub mod health;

pub use health::{create_router, start_health_server, HealthState};

use crate::relay::RelayOutcome;
use crate::session::SessionState;
use crate::telegram::BotIdentity;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub struct StatusReporter {
    started_at: DateTime<Utc>,
    started: Instant,
    state: watch::Receiver<SessionState>,
    identity: RwLock<Option<BotIdentity>>,
    last_forward_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    received: AtomicU64,
    signals: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    restarts: AtomicU64,
}

/// Counters exposed on `GET /`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelayStats {
    pub received: u64,
    pub signals: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub restarts: u64,
    pub last_forward_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl StatusReporter {
    pub fn new(state: watch::Receiver<SessionState>) -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            state,
            identity: RwLock::new(None),
            last_forward_at: RwLock::new(None),
            last_error: RwLock::new(None),
            received: AtomicU64::new(0),
            signals: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// True while the long-poll is open
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Polling
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn identity(&self) -> Option<BotIdentity> {
        self.identity.read().clone()
    }

    /// Readiness signal from a freshly opened session
    pub fn set_identity(&self, identity: BotIdentity) {
        *self.identity.write() = Some(identity);
    }

    pub fn record(&self, outcome: &RelayOutcome) {
        self.received.fetch_add(1, Ordering::Relaxed);
        match outcome {
            RelayOutcome::Ignored | RelayOutcome::NoSignal => {}
            RelayOutcome::Forwarded { .. } => {
                self.signals.fetch_add(1, Ordering::Relaxed);
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                *self.last_forward_at.write() = Some(Utc::now());
            }
            RelayOutcome::Dropped(e) => {
                self.signals.fetch_add(1, Ordering::Relaxed);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                *self.last_error.write() = Some(e.to_string());
            }
        }
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, error: &str) {
        *self.last_error.write() = Some(error.to_string());
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            received: self.received.load(Ordering::Relaxed),
            signals: self.signals.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            last_forward_at: *self.last_forward_at.read(),
            last_error: self.last_error.read().clone(),
        }
    }
}
