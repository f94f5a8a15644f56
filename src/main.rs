//! Trading Signal Relay Bot
//!
//! Forwards trading signals from a Telegram group to a channel.

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use signal_relay::{
    config::Config,
    monitor::{start_health_server, HealthState, StatusReporter},
    relay::{formatter, Relay, SignalMatcher},
    session::{PollingSession, SessionCommand, SessionState, Supervisor},
    telegram::{BotApi, InboundMessage, TelegramApi},
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "signal-relay")]
#[command(about = "Relay trading signals from a Telegram group to a channel")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (default)
    Run,
    /// Verify the token and post a test message to the destination
    Check,
    /// Show whether TEXT would be forwarded, and how
    Match {
        /// Message text to test
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Match { text } => match_text(&text),
        Commands::Run => {
            let config = load_config(&cli.config)?;
            run_relay(config).await
        }
        Commands::Check => {
            let config = load_config(&cli.config)?;
            check(config).await
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    Config::load(path).map_err(|e| {
        tracing::error!("{}", e);
        anyhow::Error::new(e).context("cannot start without configuration")
    })
}

async fn run_relay(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting signal relay bot");

    let (state_tx, state_rx) = watch::channel(SessionState::Stopped);
    let reporter = Arc::new(StatusReporter::new(state_rx));

    let api = Arc::new(TelegramApi::new(&config.telegram, config.session.poll_timeout)?);
    let relay = Relay::new(
        api.clone(),
        SignalMatcher::new()?,
        &config.telegram.source_chat_id,
        &config.telegram.target_channel_id,
    );
    let session = PollingSession::new(
        api.clone(),
        relay,
        config.session.clone(),
        state_tx,
        reporter.clone(),
    );

    if config.session.channel_probe {
        match session.probe_channel().await {
            Ok(()) => tracing::info!("Test message sent to destination channel"),
            Err(e) => tracing::warn!("Cannot post to destination channel: {}", e),
        }
    }

    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(4);

    let supervisor = Supervisor::new(config.restart.clone());
    let supervisor_handle = tokio::spawn(supervisor.run(session, cmd_rx));

    let health_state = Arc::new(HealthState {
        reporter: reporter.clone(),
        commands: cmd_tx.clone(),
        source_chat_id: config.telegram.source_chat_id.clone(),
        destination: config.telegram.target_channel_id.clone(),
    });
    let health_config = config.health.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(&health_config, health_state).await {
            tracing::error!("Health check server failed: {}", e);
        }
    });

    tracing::info!("Monitoring group: {}", config.telegram.source_chat_id);
    tracing::info!("Forwarding to channel: {}", config.telegram.target_channel_id);
    tracing::info!(
        "Health endpoint: http://{}:{}/health",
        config.health.bind_addr,
        config.health.port
    );

    shutdown_signal().await;
    tracing::info!("Shutting down gracefully");

    // Supervisor may already be gone; either way it stops
    let _ = cmd_tx.send(SessionCommand::Shutdown).await;
    drop(cmd_tx);
    supervisor_handle
        .await
        .context("supervisor task panicked")?;

    let stats = reporter.stats();
    tracing::info!(
        received = stats.received,
        forwarded = stats.forwarded,
        dropped = stats.dropped,
        restarts = stats.restarts,
        "Relay stopped"
    );
    Ok(())
}

async fn check(config: Config) -> anyhow::Result<()> {
    let api = TelegramApi::new(&config.telegram, config.session.poll_timeout)?;

    let me = api.get_me().await.context("getMe failed, check BOT_TOKEN")?;
    println!("Bot: {} (id {})", me.display_name(), me.id);

    api.send_message(&config.telegram.target_channel_id, "Bot test - can you see this?")
        .await
        .context("cannot post to TARGET_CHANNEL_ID")?;
    println!("Test message sent to {}", config.telegram.target_channel_id);
    Ok(())
}

fn match_text(text: &str) -> anyhow::Result<()> {
    let matcher = SignalMatcher::new()?;
    match matcher.matched_pattern(Some(text)) {
        Some(pattern) => {
            let message = InboundMessage {
                update_id: 0,
                message_id: 0,
                source_chat_id: String::new(),
                text: Some(text.to_string()),
                caption: None,
                received_at: chrono::Utc::now(),
            };
            println!("MATCH ({pattern})\n");
            println!("{}", formatter::format(&message, &Local::now()));
        }
        None => println!("NO MATCH"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
