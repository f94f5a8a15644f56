//! Configuration loading
//!
//! Values come from an optional TOML file and then from environment
//! variables (`.env` is loaded by the binary before this runs). Keys are the
//! lowercase form of the environment names, so `BOT_TOKEN` and `bot_token`
//! in `config.toml` are the same setting.

use crate::error::ConfigError;
use crate::session::supervisor::RestartPolicy;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Flat settings as they appear in the file / environment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub bot_token: Option<String>,
    pub source_group_id: Option<String>,
    pub target_channel_id: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_quiescence_ms")]
    pub quiescence_ms: u64,
    #[serde(default = "default_true")]
    pub drain_on_start: bool,
    #[serde(default)]
    pub channel_probe: bool,
    /// Also relay posts when the source is a channel
    #[serde(default)]
    pub relay_channel_posts: bool,

    #[serde(default = "default_conflict_restart_secs")]
    pub conflict_restart_secs: u64,
    #[serde(default = "default_multi_instance_restart_secs")]
    pub multi_instance_restart_secs: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub restart_backoff_multiplier: f64,
    #[serde(default = "default_restart_window_secs")]
    pub restart_window_secs: u64,
    #[serde(default = "default_restart_max_delay_secs")]
    pub restart_max_delay_secs: u64,
    /// Unset keeps unclassified errors out of the restart path
    pub restart_unclassified_secs: Option<u64>,

    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
fn default_poll_timeout_secs() -> u64 {
    30
}
fn default_quiescence_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_conflict_restart_secs() -> u64 {
    5
}
fn default_multi_instance_restart_secs() -> u64 {
    10
}
fn default_backoff_multiplier() -> f64 {
    1.0
}
fn default_restart_window_secs() -> u64 {
    300
}
fn default_restart_max_delay_secs() -> u64 {
    300
}
fn default_port() -> u16 {
    3000
}
fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub session: SessionConfig,
    pub restart: RestartPolicy,
    pub health: HealthConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub source_chat_id: String,
    pub target_channel_id: String,
    pub api_base_url: String,
    pub relay_channel_posts: bool,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout: Duration,
    /// Minimum gap between closing one poller and opening the next
    pub quiescence: Duration,
    pub drain_on_start: bool,
    /// Send a test message to the destination once at startup
    pub channel_probe: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(default_poll_timeout_secs()),
            quiescence: Duration::from_millis(default_quiescence_ms()),
            drain_on_start: true,
            channel_probe: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
}

impl Config {
    /// Load from `path` (optional) and the process environment
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()
    }
}

impl Settings {
    /// Check required values and convert into a [`Config`].
    ///
    /// Every missing required value is reported, not just the first.
    pub fn validate(self) -> Result<Config, ConfigError> {
        let mut missing = Vec::new();
        let bot_token = required(self.bot_token, "BOT_TOKEN", &mut missing);
        let source_chat_id = required(self.source_group_id, "SOURCE_GROUP_ID", &mut missing);
        let target_channel_id =
            required(self.target_channel_id, "TARGET_CHANNEL_ID", &mut missing);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if !(self.restart_backoff_multiplier >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "RESTART_BACKOFF_MULTIPLIER",
                reason: format!(
                    "must be at least 1.0, got {}",
                    self.restart_backoff_multiplier
                ),
            });
        }

        let bind_addr = self
            .bind_addr
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::Invalid {
                field: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Config {
            telegram: TelegramConfig {
                bot_token,
                source_chat_id,
                target_channel_id,
                api_base_url: self.api_base_url,
                relay_channel_posts: self.relay_channel_posts,
            },
            session: SessionConfig {
                poll_timeout: Duration::from_secs(self.poll_timeout_secs),
                quiescence: Duration::from_millis(self.quiescence_ms),
                drain_on_start: self.drain_on_start,
                channel_probe: self.channel_probe,
            },
            restart: RestartPolicy {
                conflict_delay: Duration::from_secs(self.conflict_restart_secs),
                multi_instance_delay: Duration::from_secs(self.multi_instance_restart_secs),
                backoff_multiplier: self.restart_backoff_multiplier,
                window: Duration::from_secs(self.restart_window_secs),
                max_delay: Duration::from_secs(self.restart_max_delay_secs),
                unclassified_delay: self.restart_unclassified_secs.map(Duration::from_secs),
            },
            health: HealthConfig {
                bind_addr,
                port: self.port,
            },
        })
    }
}

/// Trimmed non-empty value, or record `name` as missing
fn required(value: Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}
