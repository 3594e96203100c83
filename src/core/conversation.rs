//! Conversation domain model

use crate::core::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

/// A single role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered transcript of one step execution.
///
/// Serialized as a bare JSON array of `{role, content}` records so that a
/// committed log can be edited by hand and replayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Role sequence, used to compare the shape of two transcripts
    pub fn roles(&self) -> Vec<Role> {
        self.messages.iter().map(|m| m.role).collect()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The final message, which must have been written by the assistant
    pub fn final_assistant(&self) -> Result<&Message> {
        match self.messages.last() {
            Some(message) if message.role == Role::Assistant => Ok(message),
            Some(message) => Err(PipelineError::InvalidEdit(format!(
                "conversation ends with a {} message, expected assistant",
                message.role
            ))),
            None => Err(PipelineError::InvalidEdit(
                "conversation is empty".to_string(),
            )),
        }
    }

    /// Serialize in the on-disk log format (pretty JSON, trailing newline)
    pub fn to_log_string(&self) -> Result<String> {
        let mut buf = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        buf.push('\n');
        Ok(buf)
    }

    /// Parse the on-disk log format
    pub fn from_log_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::Serialization(e.to_string()))
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
