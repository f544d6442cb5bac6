//! Token accounting helpers.
//!
//! `estimate` counts whitespace-separated words. It is not a tokenizer and
//! will disagree with the model's real token count; usage accounting built on
//! it is best-effort.

use serde::{Deserialize, Serialize};

/// Tokens per ledger unit
pub const TOKENS_PER_UNIT: u32 = 100;

/// Word count of `text`, never less than 1.
pub fn estimate(text: &str) -> u32 {
    (text.split_whitespace().count() as u32).max(1)
}

/// Ledger units charged for a completion, never less than 1.
pub fn usage_cost(prompt_tokens: u32, completion_tokens: u32) -> u32 {
    ((prompt_tokens + completion_tokens) / TOKENS_PER_UNIT).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn cost(&self) -> u32 {
        usage_cost(self.prompt_tokens, self.completion_tokens)
    }
}
