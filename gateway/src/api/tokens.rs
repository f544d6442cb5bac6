use ai4all_core::ValidationError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StarterGrantRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct StarterGrantResponse {
    pub granted: bool,
    pub amount: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub async fn grant_starter(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StarterGrantRequest>, JsonRejection>,
) -> Result<Json<StarterGrantResponse>, GatewayError> {
    let Json(request) = payload.map_err(|e| ValidationError::Body(e.body_text()))?;
    let outcome = state.grants.grant(&request.session_id).await;

    Ok(Json(if outcome.granted {
        StarterGrantResponse {
            granted: true,
            amount: outcome.amount,
            message: Some(format!("Welcome! You received {} starter tokens.", outcome.amount)),
            reason: None,
        }
    } else {
        StarterGrantResponse {
            granted: false,
            amount: 0,
            message: None,
            reason: Some("already_granted"),
        }
    }))
}

pub async fn balance(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.ledger.balance().await {
        Ok(value) => Json(value),
        Err(e) => {
            tracing::debug!(reason = e.kind(), "Balance unavailable: {}", e);
            Json(serde_json::json!({ "balance": 0 }))
        }
    }
}
