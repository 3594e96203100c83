//! Retry policy for model calls

use crate::agent::{ModelError, ModelExecutor, ModelReply};
use crate::core::Conversation;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Wraps a model adapter with bounded retries and exponential backoff
#[derive(Debug, Clone)]
pub struct RetryingModel<M> {
    inner: M,
    max_retries: u32,
    backoff: Duration,
}

impl<M> RetryingModel<M> {
    pub fn new(inner: M, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[async_trait]
impl<M: ModelExecutor> ModelExecutor for RetryingModel<M> {
    async fn send(&self, conversation: &Conversation) -> Result<ModelReply, ModelError> {
        let mut retry = 0;
        loop {
            match self.inner.send(conversation).await {
                Ok(reply) => return Ok(reply),
                Err(e) if retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    warn!(
                        "Model call failed ({}), retry {}/{} in {:?}",
                        e,
                        retry + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
