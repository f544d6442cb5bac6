use serde::Deserialize;
use thiserror::Error;

use crate::messages::ChatMessage;

pub const MAX_TEMPERATURE: f64 = 2.0;
pub const MAX_TOKENS_LIMIT: u32 = 32768;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("temperature must be between 0 and 2, got {0}")]
    Temperature(f64),

    #[error("max_tokens must be between 1 and 32768, got {0}")]
    MaxTokens(u32),

    #[error("invalid request body: {0}")]
    Body(String),
}

/// OpenAI-style chat completion request
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "ai4all/llama3".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    /// Role validity is enforced when deserializing; this checks ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(ValidationError::Temperature(self.temperature));
        }
        if self.max_tokens == 0 || self.max_tokens > MAX_TOKENS_LIMIT {
            return Err(ValidationError::MaxTokens(self.max_tokens));
        }
        Ok(())
    }
}
