//! Interaction log
//!
//! Conversations are collected in memory while a step runs and committed as
//! `logs/<step>/<run_index>.json` once the step's output is saved. A committed
//! file is never rewritten; every rerun gets a new index.

use crate::core::{Conversation, Message, PipelineError, Result};
use crate::persistence::{write_atomic, LogStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const LOGS_DIR: &str = "logs";

/// Conversation logs stored as one JSON file per run
#[derive(Debug, Clone)]
pub struct FsLogStore {
    root: PathBuf,
}

impl FsLogStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root: project_root.as_ref().join(LOGS_DIR),
        }
    }

    pub fn step_dir(&self, step: &str) -> PathBuf {
        self.root.join(step)
    }

    pub fn log_path(&self, step: &str, index: u32) -> PathBuf {
        self.step_dir(step).join(format!("{}.json", index))
    }
}

#[async_trait]
impl LogStore for FsLogStore {
    async fn run_indices(&self, step: &str) -> Result<Vec<u32>> {
        let dir = self.step_dir(step);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::io(&dir, e)),
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(&dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Temp files start with '.' and never parse
            if let Some(index) = name
                .strip_suffix(".json")
                .and_then(|stem| stem.parse::<u32>().ok())
            {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    async fn read(&self, step: &str, index: u32) -> Result<Conversation> {
        let path = self.log_path(step, index);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::NotFound(format!("log {}/{}", step, index)))
            }
            Err(e) => return Err(PipelineError::io(&path, e)),
        };
        Conversation::from_log_str(&text)
    }

    async fn write(&self, step: &str, index: u32, conversation: &Conversation) -> Result<()> {
        let path = self.log_path(step, index);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| PipelineError::io(&path, e))?
        {
            return Err(PipelineError::Serialization(format!(
                "log {}/{} already exists",
                step, index
            )));
        }
        debug!("Writing {} messages to {}", conversation.len(), path.display());
        write_atomic(&path, conversation.to_log_string()?.as_bytes()).await
    }
}

/// Pending conversations plus access to committed ones
pub struct InteractionLog {
    backend: Arc<dyn LogStore>,
    pending: BTreeMap<String, Conversation>,
}

impl InteractionLog {
    pub fn new(backend: Arc<dyn LogStore>) -> Self {
        Self {
            backend,
            pending: BTreeMap::new(),
        }
    }

    /// Add a message to the step's pending conversation
    pub fn append(&mut self, step: &str, message: Message) {
        self.pending
            .entry(step.to_string())
            .or_default()
            .push(message);
    }

    /// Add every message of a conversation to the step's pending one
    pub fn extend(&mut self, step: &str, conversation: &Conversation) {
        for message in &conversation.messages {
            self.append(step, message.clone());
        }
    }

    pub fn pending(&self, step: &str) -> Option<&Conversation> {
        self.pending.get(step)
    }

    /// Drop the step's pending conversation without writing it
    pub fn discard(&mut self, step: &str) {
        self.pending.remove(step);
    }

    /// Persist the pending conversation under the next run index
    pub async fn commit(&mut self, step: &str) -> Result<u32> {
        let conversation = self
            .pending
            .get(step)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                PipelineError::NotFound(format!("no pending conversation for step '{}'", step))
            })?;

        let index = self
            .latest_index(step)
            .await?
            .map(|latest| latest + 1)
            .unwrap_or(0);
        self.backend.write(step, index, conversation).await?;
        self.pending.remove(step);

        info!("Committed log {}/{}", step, index);
        Ok(index)
    }

    /// Load a committed conversation; the latest when `index` is `None`
    pub async fn load(&self, step: &str, index: Option<u32>) -> Result<Conversation> {
        let index = match index {
            Some(index) => index,
            None => self.latest_index(step).await?.ok_or_else(|| {
                PipelineError::NotFound(format!("no committed log for step '{}'", step))
            })?,
        };
        self.backend.read(step, index).await
    }

    pub async fn latest_index(&self, step: &str) -> Result<Option<u32>> {
        Ok(self.backend.run_indices(step).await?.last().copied())
    }

    pub async fn run_indices(&self, step: &str) -> Result<Vec<u32>> {
        self.backend.run_indices(step).await
    }
}
