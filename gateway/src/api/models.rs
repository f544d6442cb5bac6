use axum::{extract::State, Json};
use std::sync::Arc;

use crate::openai::{ModelObject, ModelsResponse};
use crate::state::AppState;

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let created = chrono::Utc::now().timestamp();
    let models: Vec<ModelObject> = state
        .registry
        .list()
        .iter()
        .map(|m| ModelObject::from_entry(m, created))
        .collect();

    Json(ModelsResponse {
        object: "list",
        data: models,
    })
}
