pub mod chat;
pub mod models;
pub mod system;
pub mod tokens;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/v1/models", get(models::list_models))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/tokens/starter", post(tokens::grant_starter))
        .route("/v1/tokens/balance", get(tokens::balance))
        .route("/v1/gpu", get(system::gpu))
        .route("/v1/system/stats", get(system::system_stats))
        .route("/v1/node/status", get(system::node_status))
        .with_state(state)
}
