// ABOUTME: Configuration loading and validation for the beebrain service.
// ABOUTME: Supports TOML config files with environment variable expansion.

use crate::error::{BotError, Result};
use beebrain_core::{ResponseMode, RouterConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Top-level configuration structure for beebrain.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Passive history capture is disabled when absent.
    #[serde(default)]
    pub vector_store: Option<VectorStoreConfig>,
    #[serde(default)]
    pub bot: BotConfig,
}

/// Slack credentials for the Web API and inbound request verification.
#[derive(Clone, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...) for API calls.
    pub bot_token: String,
    /// Signing secret used to verify X-Slack-Signature. Unset skips the check.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Legacy verification token matched against the envelope `token` field.
    #[serde(default)]
    pub verification_token: Option<String>,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "verification_token",
                &self.verification_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Ollama backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for embeddings; falls back to `model`.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub mode: ResponseMode,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            model: default_model(),
            embedding_model: None,
            mode: ResponseMode::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(&self.model)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_llm_url() -> String {
    "http://ollama:11434".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// Qdrant settings for passive history capture.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_vector_size")]
    pub vector_size: u64,
    #[serde(default = "default_vector_timeout_secs")]
    pub timeout_secs: u64,
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_collection() -> String {
    "slack_messages".to_string()
}

fn default_vector_size() -> u64 {
    4096
}

fn default_vector_timeout_secs() -> u64 {
    5
}

/// Bot behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Start a thread under top-level messages instead of replying in-channel.
    #[serde(default)]
    pub thread_replies: bool,

    /// Reaction shown on a message while a reply is being composed.
    #[serde(default = "default_processing_reaction")]
    pub processing_reaction: String,

    /// Reaction on a bot message that requests a thread summary.
    #[serde(default = "default_summary_reaction")]
    pub summary_reaction: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            thread_replies: false,
            processing_reaction: default_processing_reaction(),
            summary_reaction: default_summary_reaction(),
        }
    }
}

fn default_processing_reaction() -> String {
    "eyes".to_string()
}

fn default_summary_reaction() -> String {
    "robot_face".to_string()
}

impl Config {
    /// Load configuration from the specified path or default location.
    ///
    /// Default location: `~/.config/beebrain/beebrain.toml`
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path
            .or_else(|| dirs::config_dir().map(|d| d.join("beebrain").join("beebrain.toml")))
            .ok_or_else(|| BotError::Config("Could not determine config path".into()))?;

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            BotError::Config(format!("Failed to read config from {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse and validate config text, expanding `${VAR}` references first.
    pub fn parse(contents: &str) -> Result<Self> {
        // Expand environment variables, warning on undefined vars.
        let contents = shellexpand::env_with_context_no_errors(contents, |var: &str| {
            match std::env::var(var) {
                Ok(val) => Some(val),
                Err(_) => {
                    warn!(
                        variable = %var,
                        "Environment variable not defined, using empty string"
                    );
                    Some(String::new())
                }
            }
        });

        let config: Config = toml::from_str(&contents)
            .map_err(|e| BotError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate that required fields are present and properly formatted.
    fn validate(&self) -> Result<()> {
        if self.slack.bot_token.is_empty() {
            return Err(BotError::Config("slack.bot_token is required".into()));
        }
        if !self.slack.bot_token.starts_with("xoxb-") {
            return Err(BotError::Config(
                "slack.bot_token must start with 'xoxb-' (bot token)".into(),
            ));
        }
        self.bind_addr()?;
        if self.llm.url.is_empty() {
            return Err(BotError::Config("llm.url is required".into()));
        }
        if self.llm.model.is_empty() {
            return Err(BotError::Config("llm.model is required".into()));
        }
        if let Some(store) = &self.vector_store {
            if store.url.is_empty() {
                return Err(BotError::Config("vector_store.url is required".into()));
            }
            if store.vector_size == 0 {
                return Err(BotError::Config(
                    "vector_store.vector_size must be greater than zero".into(),
                ));
            }
        }
        if self.bot.processing_reaction.is_empty() || self.bot.summary_reaction.is_empty() {
            return Err(BotError::Config("bot reactions must not be empty".into()));
        }
        Ok(())
    }

    /// Socket address the webhook server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|e| {
            BotError::Config(format!("server.bind {:?} is invalid: {}", self.server.bind, e))
        })
    }

    /// Router settings derived from the `[llm]` and `[bot]` sections.
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            mode: self.llm.mode,
            thread_replies: self.bot.thread_replies,
            processing_reaction: self.bot.processing_reaction.clone(),
            summary_reaction: self.bot.summary_reaction.clone(),
        }
    }
}
