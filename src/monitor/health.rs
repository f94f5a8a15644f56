//! Operator HTTP endpoint
//!
//! - `GET /` status summary
//! - `GET /health` liveness probe, 503 unless the session is polling
//! - `GET /restart` asks the supervisor for a restart and returns at once

use super::{RelayStats, StatusReporter};
use crate::config::HealthConfig;
use crate::session::{SessionCommand, SessionState};
use crate::telegram::BotIdentity;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Shared by all handlers
pub struct HealthState {
    pub reporter: Arc<StatusReporter>,
    pub commands: mpsc::Sender<SessionCommand>,
    pub source_chat_id: String,
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    /// Seconds since process start
    pub uptime: u64,
    pub started_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub session_state: SessionState,
    pub bot: Option<BotIdentity>,
    pub source_chat_id: String,
    pub destination: String,
    pub stats: RelayStats,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub bot_running: bool,
    pub uptime: u64,
}

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

async fn get_status(State(state): State<Arc<HealthState>>) -> Json<StatusResponse> {
    let reporter = &state.reporter;
    Json(StatusResponse {
        status: "running",
        uptime: reporter.uptime().as_secs(),
        started_at: reporter.started_at(),
        timestamp: Utc::now(),
        session_state: reporter.state(),
        bot: reporter.identity(),
        source_chat_id: state.source_chat_id.clone(),
        destination: state.destination.clone(),
        stats: reporter.stats(),
    })
}

async fn health_check(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthResponse>) {
    let running = state.reporter.is_running();
    let code = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status: if running { "healthy" } else { "unhealthy" },
            bot_running: running,
            uptime: state.reporter.uptime().as_secs(),
        }),
    )
}

async fn request_restart(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<RestartResponse>) {
    // A queued restart is as good as a second one
    match state.commands.try_send(SessionCommand::Restart) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::info!("Manual restart requested");
            (
                StatusCode::OK,
                Json(RestartResponse {
                    status: "restart_requested",
                    message: "Bot restart initiated",
                    timestamp: Utc::now(),
                }),
            )
        }
        Err(mpsc::error::TrySendError::Closed(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RestartResponse {
                status: "unavailable",
                message: "Supervisor is not running",
                timestamp: Utc::now(),
            }),
        ),
    }
}

pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/", get(get_status))
        .route("/health", get(health_check))
        .route("/restart", get(request_restart))
        .with_state(state)
}

/// Serve on an already-bound listener
pub async fn serve(listener: TcpListener, state: Arc<HealthState>) -> std::io::Result<()> {
    axum::serve(listener, create_router(state)).await
}

pub async fn start_health_server(config: &HealthConfig, state: Arc<HealthState>) -> std::io::Result<()> {
    let addr = std::net::SocketAddr::new(config.bind_addr, config.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Health check server listening on http://{}", addr);
    serve(listener, state).await
}
