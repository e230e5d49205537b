// ABOUTME: Error types for beebrain-slack.
// ABOUTME: Defines BotError enum covering Config, Slack, HTTP, and IO failures.

use beebrain_core::BrainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Slack API error: {0}")]
    Slack(String),

    #[error("Slack client error: {0}")]
    SlackClient(#[from] slack_morphism::errors::SlackClientError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] BrainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;
