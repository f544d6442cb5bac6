//! Client for the local inference daemon's chat API.
//!
//! Buffered replies are a single `{"message":{"content":..}}` object; streamed
//! replies are newline-delimited JSON objects `{"message":{..},"done":bool}`.

use ai4all_core::config::BackendConfig;
use ai4all_core::{translate, ChatMessage, CompletionRequest, ModelRegistry};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub options: BackendOptions,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

impl BackendChatRequest {
    pub fn build(request: &CompletionRequest, registry: &ModelRegistry) -> Self {
        let translated = translate(&request.messages);
        Self {
            model: registry.resolve(&request.model).to_string(),
            messages: translated.messages,
            system: (!translated.system.is_empty()).then_some(translated.system),
            options: BackendOptions {
                temperature: request.temperature as f32,
                num_predict: request.max_tokens,
            },
            stream: request.stream,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct BackendChatResponse {
    #[serde(default)]
    pub message: BackendMessage,
}

/// One line of a streamed reply
#[derive(Debug, Deserialize)]
pub struct BackendChunk {
    #[serde(default)]
    pub message: BackendMessage,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    chat_url: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        // No overall client timeout: it would also cap how long a stream may run.
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            chat_url: config.chat_url(),
            timeout: config.timeout(),
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Per-read timeout while streaming
    pub fn read_timeout(&self) -> Duration {
        self.timeout
    }

    fn unreachable(&self) -> GatewayError {
        GatewayError::BackendUnreachable {
            url: self.base_url.clone(),
        }
    }

    /// Buffered chat call; returns the assistant content.
    pub async fn chat(&self, payload: &BackendChatRequest) -> Result<String, GatewayError> {
        let response = self
            .http
            .post(&self.chat_url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    self.unreachable()
                } else {
                    GatewayError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let reply: BackendChatResponse = response.json().await?;
        Ok(reply.message.content)
    }

    /// Start a streamed chat call. Status is left for the caller to inspect.
    pub async fn open_stream(
        &self,
        payload: &BackendChatRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.http.post(&self.chat_url).json(payload).send().await
    }

    /// Whether the daemon answers at all
    pub async fn probe(&self, timeout: Duration) -> bool {
        match self
            .http
            .get(format!("{}/tags", self.base_url))
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Backend probe failed: {}", e);
                false
            }
        }
    }
}

/// Longest line accepted from a streamed reply
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Split a response body into lines, one at a time as bytes arrive.
///
/// Read errors and read timeouts end the stream; they are logged, not raised.
pub fn ndjson_lines(response: reqwest::Response, read_timeout: Duration) -> impl Stream<Item = String> {
    split_lines(response.bytes_stream(), read_timeout, MAX_LINE_BYTES)
}

/// Line splitter behind [`ndjson_lines`]. A line longer than `max_line`
/// ends the stream.
pub fn split_lines<S, B, E>(body: S, read_timeout: Duration, max_line: usize) -> impl Stream<Item = String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = match tokio::time::timeout(read_timeout, body.next()).await {
                Ok(Some(Ok(bytes))) => bytes,
                Ok(Some(Err(e))) => {
                    tracing::warn!("Backend stream read error: {}", e);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!("Backend stream read timed out after {:?}", read_timeout);
                    break;
                }
            };

            buffer.extend_from_slice(chunk.as_ref());
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                yield String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            }

            if buffer.len() > max_line {
                tracing::warn!("Backend stream line exceeds {} bytes, closing stream", max_line);
                buffer.clear();
                break;
            }
        }

        if !buffer.is_empty() {
            yield String::from_utf8_lossy(&buffer).into_owned();
        }
    }
}
