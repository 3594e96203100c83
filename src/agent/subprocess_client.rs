//! Subprocess model client - pipes the conversation through an external command

use crate::agent::{ModelError, ModelExecutor, ModelReply};
use crate::core::Conversation;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Model adapter backed by an external command
#[derive(Debug, Clone)]
pub struct SubprocessModel {
    /// Executable to spawn
    command: String,

    /// Arguments for the executable
    args: Vec<String>,

    /// Timeout for one call in seconds
    timeout_secs: u64,
}

impl SubprocessModel {
    /// Create a new subprocess model
    ///
    /// # Arguments
    /// * `command` - Executable name or path (e.g., "llm-chat")
    /// * `args` - Arguments passed on every call
    /// * `timeout_secs` - Timeout for one call in seconds
    pub fn new(command: String, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            args,
            timeout_secs,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn call(&self, payload: Vec<u8>) -> Result<std::process::Output, ModelError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ModelError::Internal(format!("Failed to spawn {}: {}", self.command, e))
            })?;

        // Feed stdin concurrently so a chatty child cannot fill its stdout pipe first
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                let result = stdin.write_all(&payload).await;
                drop(stdin);
                result
            })
        });

        let output = child.wait_with_output().await.map_err(|e| {
            ModelError::Internal(format!("Failed to wait for {}: {}", self.command, e))
        })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // A child that exits without reading its input is judged by its exit status
                Ok(Err(e)) => debug!("stdin write to {} failed: {}", self.command, e),
                Err(e) => {
                    return Err(ModelError::Internal(format!("stdin writer panicked: {}", e)))
                }
            }
        }

        Ok(output)
    }
}

#[async_trait]
impl ModelExecutor for SubprocessModel {
    /// Send the conversation to the command and read its reply
    ///
    /// # Errors
    /// Returns `ModelError` if:
    /// - The executable cannot be spawned
    /// - It exits with a non-zero status
    /// - The output is not valid UTF-8
    /// - The call times out
    async fn send(&self, conversation: &Conversation) -> Result<ModelReply, ModelError> {
        let payload = serde_json::to_vec(conversation)
            .map_err(|e| ModelError::Internal(format!("Failed to encode conversation: {}", e)))?;
        debug!(
            "Spawning {} with {} messages ({} bytes)",
            self.command,
            conversation.len(),
            payload.len()
        );

        let output = timeout(Duration::from_secs(self.timeout_secs), self.call(payload))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout_secs))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.command, exit_code, stderr.trim());
            return Err(ModelError::Api(format!(
                "{} exited with code {}: {}",
                self.command,
                exit_code,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| ModelError::Internal(format!("Failed to decode output: {}", e)))?;
        debug!("{} returned {} bytes", self.command, stdout.len());

        Ok(parse_reply(stdout))
    }
}

/// Structured replies carry usage; anything else is the reply text itself
fn parse_reply(stdout: String) -> ModelReply {
    match serde_json::from_str::<ModelReply>(stdout.trim()) {
        Ok(reply) => reply,
        Err(_) => ModelReply::new(stdout),
    }
}
