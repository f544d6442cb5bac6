use ai4all_core::{CompletionRequest, ValidationError};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::StreamExt;
use std::{convert::Infallible, sync::Arc};

use crate::completion::Completion;
use crate::error::GatewayError;
use crate::state::AppState;
use crate::stream::StreamEvent;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(request) = payload.map_err(|e| ValidationError::Body(e.body_text()))?;

    match state.gateway.complete(request).await? {
        Completion::Buffered(result) => Ok(Json(result.to_openai()).into_response()),
        Completion::Stream(stream) => {
            let events = stream
                .events
                .map(|event| Ok::<_, Infallible>(to_sse(event)));
            Ok(([(REQUEST_ID_HEADER, stream.id)], Sse::new(events)).into_response())
        }
    }
}

/// One `data: ...` record per event
fn to_sse(event: StreamEvent) -> Event {
    let framed = match event {
        StreamEvent::Chunk(chunk) => Event::default().json_data(chunk.to_openai()),
        StreamEvent::Error(error) => Event::default().json_data(error),
        StreamEvent::Done => return Event::default().data("[DONE]"),
    };
    framed.unwrap_or_else(|e| {
        tracing::error!("Failed to encode stream event: {}", e);
        Event::default().data("{}")
    })
}
