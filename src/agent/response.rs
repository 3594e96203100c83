//! Model response types

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use thiserror::Error;

/// Error types for model operations
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reply from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReply {
    /// The assistant message content
    pub content: String,

    /// Token usage information (if available)
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl ModelReply {
    /// Create a reply without usage information
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}
