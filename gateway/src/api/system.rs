use ai4all_core::gpu::{self, GpuStatus};
use ai4all_core::system::SystemStats;
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
}

/// Liveness. Always ok; the backend probe is informational.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let reachable = state
        .gateway
        .backend()
        .probe(state.config.backend.probe_timeout())
        .await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: if reachable { "reachable" } else { "unreachable" },
    })
}

pub async fn gpu() -> Json<GpuStatus> {
    let status = tokio::task::spawn_blocking(gpu::detect_gpus)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("GPU probe failed: {}", e);
            GpuStatus::from_devices(Vec::new())
        });
    Json(status)
}

pub async fn system_stats(State(state): State<Arc<AppState>>) -> Json<SystemStats> {
    let samples = tokio::task::spawn_blocking(gpu::sample_gpus)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("GPU sampling failed: {}", e);
            Vec::new()
        });

    let mut probe = state
        .system
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Json(probe.sample(samples))
}

pub async fn node_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.ledger.node_status().await {
        Ok(value) => Json(value),
        Err(e) => {
            tracing::debug!(reason = e.kind(), "Node status unavailable: {}", e);
            Json(serde_json::json!({ "error": "Node daemon not reachable" }))
        }
    }
}
