//! Model and human boundaries consumed by steps

pub mod client;
pub mod response;
pub mod retry;
pub mod subprocess_client;

use crate::core::Conversation;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use client::ModelClientConfig;
pub use response::{ModelError, ModelReply, TokenUsage};
pub use retry::RetryingModel;
pub use subprocess_client::SubprocessModel;

/// Trait for model invocation - allows for different implementations
#[async_trait]
pub trait ModelExecutor: Send + Sync {
    /// Return the assistant's next message for the conversation so far
    async fn send(&self, conversation: &Conversation) -> Result<ModelReply, ModelError>;
}

#[async_trait]
impl<T: ModelExecutor + ?Sized> ModelExecutor for Arc<T> {
    async fn send(&self, conversation: &Conversation) -> Result<ModelReply, ModelError> {
        (**self).send(conversation).await
    }
}

/// Source of answers to clarifying questions
#[async_trait]
pub trait HumanInput: Send + Sync {
    /// Answer the assistant's question; `None` means no answer was given
    async fn answer(&self, question: &str) -> Option<String>;
}

/// Human that never answers, for non-interactive runs
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentHuman;

#[async_trait]
impl HumanInput for SilentHuman {
    async fn answer(&self, _question: &str) -> Option<String> {
        None
    }
}

/// Build the configured model adapter with its retry policy
pub fn model_from_config(config: &ModelClientConfig) -> RetryingModel<SubprocessModel> {
    let model = SubprocessModel::new(
        config.command.clone(),
        config.args.clone(),
        config.timeout_secs,
    );
    RetryingModel::new(
        model,
        config.max_retries,
        Duration::from_millis(config.retry_backoff_ms),
    )
}
