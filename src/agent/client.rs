//! Model client configuration

use serde::{Deserialize, Serialize};

/// Configuration for the model adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelClientConfig {
    /// Executable that answers a conversation
    ///
    /// The conversation is written to its stdin as JSON; stdout is the
    /// assistant reply, either plain text or a `{"content", "usage"}` object.
    pub command: String,

    /// Extra arguments passed to the command
    pub args: Vec<String>,

    /// Timeout for one model call in seconds
    pub timeout_secs: u64,

    /// Extra attempts after a failed call
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry
    pub retry_backoff_ms: u64,
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            command: "llm-chat".to_string(),
            args: Vec::new(),
            timeout_secs: 600,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl ModelClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}
