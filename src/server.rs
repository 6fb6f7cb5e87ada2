// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP server for metrics, health probes and a read-only view of the registry.
//!
//! | Route       | Response                                                    |
//! |-------------|-------------------------------------------------------------|
//! | `/metrics`  | Prometheus text format                                      |
//! | `/healthz`  | `200 {"status":"ok"}` while the process is running          |
//! | `/readyz`   | `200` once the registry is initialized, `503` before        |
//! | `/monitors` | JSON array of cached monitors, sorted by hostname           |

use crate::metrics;
use crate::monitor::MonitorRecord;
use crate::registry::MonitorRegistry;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<MonitorRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Arc<MonitorRegistry>) -> Self {
        Self { registry }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub monitors: usize,
}

/// Build the router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health))
        .route("/readyz", get(readiness))
        .route("/monitors", get(list_monitors))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn readiness(State(state): State<AppState>) -> Response {
    if state.registry.is_initialized() {
        (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                monitors: state.registry.len(),
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "initializing",
                monitors: 0,
            }),
        )
            .into_response()
    }
}

async fn list_monitors(State(state): State<AppState>) -> Json<Vec<MonitorRecord>> {
    let mut monitors: Vec<MonitorRecord> = state.registry.snapshot().into_values().collect();
    monitors.sort_by(|a, b| a.hostname.cmp(&b.hostname));
    Json(monitors)
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve the router on `addr` until the listener fails.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or serving fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Metrics and health server listening");
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}
