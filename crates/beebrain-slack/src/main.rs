// ABOUTME: Entry point for the beebrain binary.
// ABOUTME: Parses CLI flags, initializes logging, and runs the webhook service.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beebrain")]
#[command(about = "Slack conversational agent backed by a local LLM")]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "BEEBRAIN_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level for beebrain crates (error, warn, info, debug, trace)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (level, invalid_level) = match cli.log_level.parse::<LevelFilter>() {
        Ok(level) => (level, false),
        Err(_) => (LevelFilter::INFO, true),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,beebrain_core={level},beebrain_slack={level}",
            level = level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if invalid_level {
        tracing::warn!(log_level = %cli.log_level, "Invalid log level, using info");
    }

    beebrain_slack::run(cli.config).await
}
