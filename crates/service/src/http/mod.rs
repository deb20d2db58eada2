//! JSON-RPC server
//!
//! `POST /` (or `/rpc`) accepts [`rpc::UPLOAD_METHOD`] calls. Liveness and
//! version are served under `/_status`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use tokio::sync::watch;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};

use crate::funding::{Bridge, SwapExecutor};
use crate::ledger::Ledger;
use crate::orchestrator::Orchestrator;

mod health;
pub mod rpc;

const STATUS_PREFIX: &str = "/_status";

/// Slack over the base64-expanded payload for the rest of the envelope.
const ENVELOPE_OVERHEAD_BYTES: usize = 64 * 1024;

/// Largest request body accepted when decoded payloads are capped at
/// `max_payload_bytes`.
pub const fn body_limit(max_payload_bytes: usize) -> usize {
    max_payload_bytes.saturating_mul(4) / 3 + ENVELOPE_OVERHEAD_BYTES
}

/// Builds the service router.
pub fn router<L, S, B>(state: Arc<Orchestrator<L, S, B>>, log_level: tracing::Level) -> Router
where
    L: Ledger + 'static,
    S: SwapExecutor + 'static,
    B: Bridge + 'static,
{
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let limit = body_limit(state.settings().max_payload_bytes);
    Router::new()
        .route("/", post(rpc::handler::<L, S, B>))
        .route("/rpc", post(rpc::handler::<L, S, B>))
        .nest(STATUS_PREFIX, health::router())
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
        .layer(trace_layer)
}

/// Serves `state` on `listen_addr` until `shutdown_rx` fires.
pub async fn run<L, S, B>(
    listen_addr: SocketAddr,
    log_level: tracing::Level,
    state: Arc<Orchestrator<L, S, B>>,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError>
where
    L: Ledger + 'static,
    S: SwapExecutor + 'static,
    B: Bridge + 'static,
{
    let router = router(state, log_level);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = ?listen_addr, "JSON-RPC server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

/// Errors raised while serving.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Binding or serving failed.
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
