//! Streaming bridge from the backend's line-delimited JSON to OpenAI chunks.
//!
//! [`StreamTranslator`] is the per-response state machine; [`drive`] feeds it
//! from a live backend connection one line at a time.

use ai4all_core::{estimate, Usage};
use futures_util::stream::{Stream, StreamExt};

use crate::accounting::UsageAccountant;
use crate::backend::{ndjson_lines, BackendChatRequest, BackendChunk, BackendClient};
use crate::openai::{ChatChoiceDelta, ChatCompletionChunk, Delta, ErrorResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    /// Backend signalled completion or went away; no more lines are read
    Done,
    /// The end sentinel has been emitted
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub delta_content: String,
    pub is_final: bool,
}

impl StreamChunk {
    pub fn to_openai(&self) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChoiceDelta {
                index: 0,
                delta: if self.is_final {
                    Delta::default()
                } else {
                    Delta {
                        content: Some(self.delta_content.clone()),
                    }
                },
                finish_reason: self.is_final.then_some("stop"),
            }],
        }
    }
}

/// What the HTTP layer should send next
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Chunk(StreamChunk),
    Error(ErrorResponse),
    /// The `[DONE]` sentinel
    Done,
}

#[derive(Debug)]
pub struct StreamTranslator {
    id: String,
    created: i64,
    model: String,
    prompt_tokens: u32,
    completion_tokens: u32,
    state: StreamState,
}

impl StreamTranslator {
    pub fn new(id: impl Into<String>, created: i64, model: impl Into<String>, prompt_tokens: u32) -> Self {
        Self {
            id: id.into(),
            created,
            model: model.into(),
            prompt_tokens,
            completion_tokens: 0,
            state: StreamState::Streaming,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn completion_tokens(&self) -> u32 {
        self.completion_tokens
    }

    /// Translate one backend line.
    ///
    /// Blank and malformed lines yield nothing. Lines arriving after the
    /// final chunk are ignored.
    pub fn feed(&mut self, line: &str) -> Option<StreamChunk> {
        if self.state != StreamState::Streaming || line.trim().is_empty() {
            return None;
        }

        let chunk: BackendChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!("Skipping malformed stream line: {}", e);
                return None;
            }
        };

        let fragment = chunk.message.content;
        if !fragment.is_empty() {
            self.completion_tokens += estimate(&fragment);
        }

        if chunk.done {
            self.state = StreamState::Done;
            Some(self.chunk(String::new(), true))
        } else {
            Some(self.chunk(fragment, false))
        }
    }

    /// Mark the stream finished without a completion signal.
    pub fn abort(&mut self) {
        if self.state == StreamState::Streaming {
            self.state = StreamState::Done;
        }
    }

    /// Emit the end sentinel. Returns the final usage the first time only.
    pub fn close(&mut self) -> Option<Usage> {
        if self.state == StreamState::Closed {
            return None;
        }
        self.state = StreamState::Closed;
        Some(Usage::new(self.prompt_tokens, self.completion_tokens))
    }

    fn chunk(&self, delta_content: String, is_final: bool) -> StreamChunk {
        StreamChunk {
            id: self.id.clone(),
            created: self.created,
            model: self.model.clone(),
            delta_content,
            is_final,
        }
    }
}

/// Run `translator` over `lines` until completion is signalled or the lines
/// run out.
pub fn translate_lines<'a, S>(
    translator: &'a mut StreamTranslator,
    lines: S,
) -> impl Stream<Item = StreamChunk> + 'a
where
    S: Stream<Item = String> + 'a,
{
    async_stream::stream! {
        futures_util::pin_mut!(lines);
        while let Some(line) = lines.next().await {
            if let Some(chunk) = translator.feed(&line) {
                yield chunk;
            }
            if translator.state() != StreamState::Streaming {
                break;
            }
        }
    }
}

/// Open the backend stream and translate it into events.
///
/// Always ends with [`StreamEvent::Done`], after which the usage report is
/// queued. Dropping the returned stream drops the backend connection.
pub fn drive(
    mut translator: StreamTranslator,
    backend: BackendClient,
    payload: BackendChatRequest,
    accountant: UsageAccountant,
) -> impl Stream<Item = StreamEvent> {
    async_stream::stream! {
        match backend.open_stream(&payload).await {
            Ok(response) if !response.status().is_success() => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status, "Backend rejected stream: {}", body);
                translator.abort();
                yield StreamEvent::Error(ErrorResponse::new(
                    format!("Backend error ({}): {}", status, body),
                    "backend_error",
                ));
            }
            Ok(response) => {
                {
                    let lines = ndjson_lines(response, backend.read_timeout());
                    let chunks = translate_lines(&mut translator, lines);
                    futures_util::pin_mut!(chunks);
                    while let Some(chunk) = chunks.next().await {
                        yield StreamEvent::Chunk(chunk);
                    }
                }
                translator.abort();
            }
            Err(e) if e.is_connect() => {
                tracing::error!("Cannot reach backend at {}: {}", backend.chat_url(), e);
                translator.abort();
                yield StreamEvent::Error(ErrorResponse::new(
                    "Cannot reach the inference backend",
                    "connection_error",
                ));
            }
            Err(e) => {
                tracing::error!("Backend stream request failed: {}", e);
                translator.abort();
                yield StreamEvent::Error(ErrorResponse::new(
                    format!("Backend request failed: {}", e),
                    "backend_error",
                ));
            }
        }

        if let Some(usage) = translator.close() {
            accountant.report(usage, &translator.model);
            yield StreamEvent::Done;
        }
    }
}
