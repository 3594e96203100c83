//! Persistence layer for project state and interaction logs
//!
//! Both stores are injected into the runner as trait objects so tests can use
//! the in-memory implementations. One runner per project at a time is
//! assumed; nothing here guards against concurrent writers.

pub mod log;
pub mod store;

pub use log::{FsLogStore, InteractionLog};
pub use store::FsStateStore;

use crate::core::{Conversation, PipelineError, Project, Result, Stage, StageSnapshot};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Trait for project state backends
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the main specification and every persisted stage
    async fn load(&self) -> Result<Project>;

    /// Replace exactly one stage; atomic per stage
    async fn save(&self, stage: Stage, snapshot: &StageSnapshot) -> Result<()>;

    /// Write the main specification
    async fn write_main_spec(&self, text: &str) -> Result<()>;
}

/// Trait for conversation log backends
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Committed run indices for a step, ascending
    async fn run_indices(&self, step: &str) -> Result<Vec<u32>>;

    /// Read one committed conversation
    async fn read(&self, step: &str, index: u32) -> Result<Conversation>;

    /// Persist a conversation under a new index in one durable operation
    async fn write(&self, step: &str, index: u32, conversation: &Conversation) -> Result<()>;
}

/// Write `contents` to `path` through a temp file and rename
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        PipelineError::NotFound(format!("parent directory of {}", path.display()))
    })?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| PipelineError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path: PathBuf = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| PipelineError::io(&tmp_path, e))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(PipelineError::io(path, e));
    }
    Ok(())
}

/// Remove temp files an interrupted `write_atomic` left in `dir`
pub async fn remove_stale_temp_files(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(PipelineError::io(dir, e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !(name.starts_with('.') && name.ends_with(".tmp")) {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            debug!("Removing stale temp file {}", path.display());
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| PipelineError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// In-memory project state (for testing or ephemeral use)
pub struct InMemoryStateStore {
    path: PathBuf,
    main_spec: RwLock<Option<String>>,
    stages: RwLock<BTreeMap<Stage, StageSnapshot>>,
}

impl InMemoryStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            main_spec: RwLock::new(None),
            stages: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_spec(path: impl Into<PathBuf>, spec: &str) -> Self {
        Self {
            path: path.into(),
            main_spec: RwLock::new(Some(spec.to_string())),
            stages: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> Result<Project> {
        let stages = self.stages.read().await.clone();
        let main_spec = match self.main_spec.read().await.clone() {
            Some(spec) => spec,
            None => stages
                .get(&Stage::Raw)
                .and_then(|raw| raw.files.get(crate::core::MAIN_SPEC_FILE).cloned())
                .ok_or_else(|| {
                    PipelineError::NotFound(format!(
                        "no specification or workspace for {}",
                        self.path.display()
                    ))
                })?,
        };
        Ok(Project {
            path: self.path.clone(),
            main_spec,
            stages,
        })
    }

    async fn save(&self, stage: Stage, snapshot: &StageSnapshot) -> Result<()> {
        self.stages.write().await.insert(stage, snapshot.clone());
        Ok(())
    }

    async fn write_main_spec(&self, text: &str) -> Result<()> {
        *self.main_spec.write().await = Some(text.to_string());
        Ok(())
    }
}

/// In-memory conversation logs (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryLogStore {
    logs: RwLock<HashMap<String, BTreeMap<u32, Conversation>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn run_indices(&self, step: &str) -> Result<Vec<u32>> {
        let logs = self.logs.read().await;
        Ok(logs
            .get(step)
            .map(|runs| runs.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn read(&self, step: &str, index: u32) -> Result<Conversation> {
        let logs = self.logs.read().await;
        logs.get(step)
            .and_then(|runs| runs.get(&index))
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("log {}/{}", step, index)))
    }

    async fn write(&self, step: &str, index: u32, conversation: &Conversation) -> Result<()> {
        let mut logs = self.logs.write().await;
        let runs = logs.entry(step.to_string()).or_default();
        if runs.contains_key(&index) {
            return Err(PipelineError::Serialization(format!(
                "log {}/{} already exists",
                step, index
            )));
        }
        runs.insert(index, conversation.clone());
        Ok(())
    }
}
