use ai4all_core::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::openai::ErrorResponse;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Cannot reach the inference backend at {url}. Run: ollama serve")]
    BackendUnreachable { url: String },

    #[error("Backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::BackendUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Backend { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "invalid_request_error",
            GatewayError::BackendUnreachable { .. } => "connection_error",
            GatewayError::Backend { .. } => "backend_error",
            GatewayError::Http(_) => "server_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }
        (status, Json(ErrorResponse::new(self.to_string(), self.error_type()))).into_response()
    }
}
