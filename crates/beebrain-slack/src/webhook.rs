// ABOUTME: Slack Events API webhook endpoint built on axum.
// ABOUTME: Verifies requests, decodes deliveries, and hands events to the router.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use beebrain_core::{decode, EventRouter, RouteOutcome};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

const RETRY_HEADER: &str = "X-Slack-Retry-Num";
const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    router: Arc<EventRouter>,
    signing_secret: Option<String>,
    verification_token: Option<String>,
}

impl WebhookState {
    pub fn new(
        router: Arc<EventRouter>,
        signing_secret: Option<String>,
        verification_token: Option<String>,
    ) -> Self {
        Self {
            router,
            // Empty values from unset env vars disable the check.
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
            verification_token: verification_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Routes: `POST /` and `POST /events` for deliveries, `GET /health` for probes.
pub fn app(state: WebhookState) -> Router {
    Router::new()
        .route("/", post(handle_events))
        .route("/events", post(handle_events))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the webhook until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: WebhookState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_delivery(&state, &headers, &body).await
}

/// Process one delivery. Everything except a challenge is acknowledged
/// with a bare 200 so the platform never retries on our account.
pub async fn handle_delivery(state: &WebhookState, headers: &HeaderMap, body: &[u8]) -> Response {
    let retry_num = header_str(headers, RETRY_HEADER).filter(|r| !r.is_empty());
    if let Some(retry) = retry_num {
        debug!(retry = %retry, "Retry delivery, acknowledging");
        return StatusCode::OK.into_response();
    }

    if let Some(ref secret) = state.signing_secret {
        let timestamp = header_str(headers, TIMESTAMP_HEADER).unwrap_or("");
        let signature = header_str(headers, SIGNATURE_HEADER).unwrap_or("");
        if !verify_signature(secret, timestamp, signature, body) {
            warn!("Rejected webhook request: invalid Slack signature");
            return StatusCode::OK.into_response();
        }
    }

    let delivery = match decode(body) {
        Ok(delivery) => delivery,
        Err(e) => {
            warn!(error = %e, "Failed to decode webhook body");
            return StatusCode::OK.into_response();
        }
    };

    if let Some(ref expected) = state.verification_token {
        if delivery.token.as_deref() != Some(expected.as_str()) {
            warn!(kind = %delivery.event.kind(), "Rejected webhook request: verification token mismatch");
            return StatusCode::OK.into_response();
        }
    }

    match state.router.route(delivery.event, retry_num).await {
        RouteOutcome::Challenge(challenge) => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        outcome => {
            debug!(outcome = ?outcome, "Event handled");
            StatusCode::OK.into_response()
        }
    }
}

/// Signature Slack would send for `body` at `timestamp`: `v0=` + hex HMAC-SHA256.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("v0:{}:", timestamp).as_bytes());
    mac.update(body);
    Some(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time check of an `X-Slack-Signature` header value.
pub fn verify_signature(secret: &str, timestamp: &str, signature: &str, body: &[u8]) -> bool {
    let Some(expected) = signature
        .strip_prefix("v0=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
    else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("v0:{}:", timestamp).as_bytes());
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
