//! HTTP status probe reporting storage and transport health.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use kudos_store::RecognitionStore;
use serde_json::json;
use tokio::net::TcpListener;

use crate::slack_runtime::read_transport_health;

const HEALTH_ENDPOINT: &str = "/healthz";

#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub bind: String,
    pub state_path: PathBuf,
}

#[derive(Clone)]
struct HealthState {
    store: Arc<dyn RecognitionStore>,
    state_path: PathBuf,
}

/// Serves the `/healthz` probe until shutdown is requested.
pub async fn run_health_server(
    config: HealthServerConfig,
    store: Arc<dyn RecognitionStore>,
) -> Result<()> {
    let bind_addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid --health-bind '{}': expected host:port", config.bind))?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind health probe on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve health probe listen address")?;
    println!("kudos health probe listening: addr={local_addr}");

    let app = build_health_router(HealthState {
        store,
        state_path: config.state_path,
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("health probe server exited unexpectedly")?;
    Ok(())
}

fn build_health_router(state: HealthState) -> Router {
    Router::new()
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

/// Storage reachability decides the status code. Per-event processing
/// failures never surface here; only an unreachable store flips the probe.
async fn handle_health(State(state): State<HealthState>) -> Response {
    let transport = read_transport_health(&state.state_path);
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "storage": "ok",
                "transport": transport,
            })),
        )
            .into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unavailable",
                "storage": error.to_string(),
                "transport": transport,
            })),
        )
            .into_response(),
    }
}
