// ABOUTME: Library root for beebrain-slack.
// ABOUTME: Exports config, collaborator clients, webhook, and the service entry point.

pub mod config;
pub mod error;
pub mod ollama;
pub mod qdrant;
pub mod slack;
pub mod webhook;

pub use config::Config;
pub use error::{BotError, Result};
pub use ollama::OllamaClient;
pub use qdrant::QdrantClient;
pub use slack::BeeBrainSlackClient;
pub use webhook::WebhookState;

use beebrain_core::{DedupStore, EventRouter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Run the beebrain service with the given config path.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    info!("beebrain starting");

    // Load configuration
    let config = Config::load(config_path)?;
    let addr = config.bind_addr()?;
    info!(
        bind = %addr,
        llm = %config.llm.url,
        model = %config.llm.model,
        mode = ?config.llm.mode,
        vector_store = config.vector_store.is_some(),
        "Configuration loaded"
    );

    let slack = Arc::new(BeeBrainSlackClient::new(&config.slack).await?);
    let llm = Arc::new(OllamaClient::new(&config.llm)?);
    let dedup = Arc::new(DedupStore::new());

    let mut router = EventRouter::new(slack, llm.clone(), dedup, config.router_config());

    if let Some(store_config) = &config.vector_store {
        let store = QdrantClient::new(store_config)?;
        store.ensure_collection().await?;
        info!(collection = %store_config.collection, "Passive history capture enabled");
        router = router.with_vector_store(llm, Arc::new(store));
    }

    let state = WebhookState::new(
        Arc::new(router),
        config.slack.signing_secret.clone(),
        config.slack.verification_token.clone(),
    );

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Webhook server listening");

    webhook::serve(listener, state, shutdown_signal()).await?;

    info!("beebrain stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
