use ai4all_core::{estimate, CompletionRequest, ModelRegistry, Usage};
use futures_util::stream::{BoxStream, StreamExt};
use std::sync::Arc;

use crate::accounting::UsageAccountant;
use crate::backend::{BackendChatRequest, BackendClient};
use crate::error::GatewayError;
use crate::openai::{ChatChoice, ChatCompletionResponse, ChatMessageOutput};
use crate::stream::{self, StreamEvent, StreamTranslator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub id: String,
    pub created: i64,
    /// Public model id as the client sent it
    pub model: String,
    pub content: String,
    pub usage: Usage,
}

impl CompletionResult {
    pub fn to_openai(&self) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: self.id.clone(),
            object: "chat.completion",
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessageOutput {
                    role: "assistant",
                    content: self.content.clone(),
                },
                finish_reason: "stop",
            }],
            usage: self.usage,
        }
    }
}

pub struct CompletionStream {
    pub id: String,
    pub events: BoxStream<'static, StreamEvent>,
}

pub enum Completion {
    Buffered(CompletionResult),
    Stream(CompletionStream),
}

pub fn new_request_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Runs one chat completion end to end.
#[derive(Clone)]
pub struct CompletionGateway {
    registry: Arc<ModelRegistry>,
    backend: BackendClient,
    accountant: UsageAccountant,
}

impl CompletionGateway {
    pub fn new(registry: Arc<ModelRegistry>, backend: BackendClient, accountant: UsageAccountant) -> Self {
        Self {
            registry,
            backend,
            accountant,
        }
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        request.validate()?;

        let payload = BackendChatRequest::build(&request, &self.registry);
        let id = new_request_id();
        let created = chrono::Utc::now().timestamp();
        let prompt_tokens: u32 = request.messages.iter().map(|m| estimate(&m.content)).sum();

        tracing::debug!(
            id = %id,
            model = %request.model,
            backend_model = %payload.model,
            stream = request.stream,
            "Chat completion"
        );

        if request.stream {
            let translator = StreamTranslator::new(id.clone(), created, request.model, prompt_tokens);
            let events = stream::drive(translator, self.backend.clone(), payload, self.accountant.clone());
            return Ok(Completion::Stream(CompletionStream {
                id,
                events: events.boxed(),
            }));
        }

        let content = self.backend.chat(&payload).await?;
        let usage = Usage::new(prompt_tokens, estimate(&content));
        self.accountant.report(usage, &request.model);

        Ok(Completion::Buffered(CompletionResult {
            id,
            created,
            model: request.model,
            content,
            usage,
        }))
    }
}
