//! Error types

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, BotError>;

/// Top-level bot error
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-ok reply from the Bot API. Rendered as `"<code> <description>"` so
    /// the supervisor can classify it from the text alone.
    #[error("{}", render_api_error(.code, .description))]
    Api {
        code: Option<i64>,
        description: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid signal pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    pub fn api(code: Option<i64>, description: impl Into<String>) -> Self {
        Self::Api {
            code,
            description: description.into(),
        }
    }
}

fn render_api_error(code: &Option<i64>, description: &str) -> String {
    match code {
        Some(code) => format!("{} {}", code, description),
        None => description.to_string(),
    }
}

/// Configuration errors. `Missing` is the only fatal error in the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),
}

/// A forward that the destination refused. Logged and dropped, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to publish to {destination}: {message}")]
pub struct PublishError {
    pub destination: String,
    pub message: String,
}
