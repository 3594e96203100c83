//! Filesystem project state store
//!
//! Layout under the project root:
//!
//! ```text
//! prompt                          main specification
//! workspace/<stage>/files/...     stage files
//! workspace/<stage>/memory.json   step memory for the stage
//! ```
//!
//! A stage is built in `workspace/.tmp-<stage>-<id>`, the current directory is
//! moved to `workspace/.old-<stage>-<id>`, and the new one is renamed into
//! place. `load` restores a set-aside copy if a crash hit between the renames,
//! and clears unfinished `.tmp-*` stages and temp files from atomic writes.

use crate::core::parser::validate_path;
use crate::core::{
    FilesDict, PipelineError, Project, Result, Stage, StageSnapshot, StepMemory, MAIN_SPEC_FILE,
};
use crate::persistence::log::LOGS_DIR;
use crate::persistence::{remove_stale_temp_files, write_atomic, StateStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub const WORKSPACE_DIR: &str = "workspace";
const FILES_DIR: &str = "files";
const MEMORY_FILE: &str = "memory.json";

/// Project state stored as plain files
#[derive(Debug, Clone)]
pub struct FsStateStore {
    root: PathBuf,
}

impl FsStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workspace(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.workspace().join(stage.dir_name())
    }

    fn main_spec_path(&self) -> PathBuf {
        self.root.join(MAIN_SPEC_FILE)
    }

    /// Clean up after a crash: put back a stage whose swap was interrupted
    /// after the old copy moved aside, and drop half-written temp entries
    async fn recover(&self) -> Result<()> {
        remove_stale_temp_files(&self.root).await?;
        self.sweep_log_dirs().await?;

        let workspace = self.workspace();
        let mut entries = match tokio::fs::read_dir(&workspace).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(PipelineError::io(&workspace, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(&workspace, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(".tmp-") {
                debug!("Removing unfinished stage {}", entry.path().display());
                tokio::fs::remove_dir_all(entry.path())
                    .await
                    .map_err(|e| PipelineError::io(entry.path(), e))?;
                continue;
            }
            let Some(rest) = name.strip_prefix(".old-") else {
                continue;
            };
            let Some(stage) = Stage::ALL
                .into_iter()
                .find(|s| rest.starts_with(&format!("{}-", s.dir_name())))
            else {
                continue;
            };

            let target = self.stage_dir(stage);
            if tokio::fs::try_exists(&target)
                .await
                .map_err(|e| PipelineError::io(&target, e))?
            {
                debug!("Removing stale backup {}", entry.path().display());
                tokio::fs::remove_dir_all(entry.path())
                    .await
                    .map_err(|e| PipelineError::io(entry.path(), e))?;
            } else {
                warn!("Restoring interrupted stage {} from {}", stage, name);
                tokio::fs::rename(entry.path(), &target)
                    .await
                    .map_err(|e| PipelineError::io(&target, e))?;
            }
        }
        Ok(())
    }

    async fn sweep_log_dirs(&self) -> Result<()> {
        let logs = self.root.join(LOGS_DIR);
        let mut entries = match tokio::fs::read_dir(&logs).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(PipelineError::io(&logs, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(&logs, e))?
        {
            if entry.path().is_dir() {
                remove_stale_temp_files(&entry.path()).await?;
            }
        }
        Ok(())
    }

    async fn read_stage(&self, stage: Stage) -> Result<Option<StageSnapshot>> {
        let dir = self.stage_dir(stage);
        if !tokio::fs::try_exists(&dir)
            .await
            .map_err(|e| PipelineError::io(&dir, e))?
        {
            return Ok(None);
        }

        let files = read_tree(&dir.join(FILES_DIR)).await?;
        let memory_path = dir.join(MEMORY_FILE);
        let memory: StepMemory = match tokio::fs::read_to_string(&memory_path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                PipelineError::Serialization(format!("{}: {}", memory_path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StepMemory::new(),
            Err(e) => return Err(PipelineError::io(&memory_path, e)),
        };

        Ok(Some(StageSnapshot { files, memory }))
    }

    async fn write_stage_dir(&self, dir: &Path, snapshot: &StageSnapshot) -> Result<()> {
        let files_dir = dir.join(FILES_DIR);
        tokio::fs::create_dir_all(&files_dir)
            .await
            .map_err(|e| PipelineError::io(&files_dir, e))?;

        for (name, content) in &snapshot.files {
            validate_path(name)?;
            let path = files_dir.join(name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PipelineError::io(parent, e))?;
            }
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| PipelineError::io(&path, e))?;
        }

        let mut memory = serde_json::to_string_pretty(&snapshot.memory)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        memory.push('\n');
        let memory_path = dir.join(MEMORY_FILE);
        tokio::fs::write(&memory_path, memory)
            .await
            .map_err(|e| PipelineError::io(&memory_path, e))
    }
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn load(&self) -> Result<Project> {
        debug!(root = %self.root.display(), "loading project");
        self.recover().await?;

        let mut stages = BTreeMap::new();
        for stage in Stage::ALL {
            if let Some(snapshot) = self.read_stage(stage).await? {
                stages.insert(stage, snapshot);
            }
        }

        let spec_path = self.main_spec_path();
        let main_spec = match tokio::fs::read_to_string(&spec_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => stages
                .get(&Stage::Raw)
                .and_then(|raw| raw.files.get(MAIN_SPEC_FILE).cloned())
                .ok_or_else(|| {
                    PipelineError::NotFound(format!(
                        "no specification at {} and no workspace",
                        spec_path.display()
                    ))
                })?,
            Err(e) => return Err(PipelineError::io(&spec_path, e)),
        };

        Ok(Project {
            path: self.root.clone(),
            main_spec,
            stages,
        })
    }

    async fn save(&self, stage: Stage, snapshot: &StageSnapshot) -> Result<()> {
        let workspace = self.workspace();
        let id = Uuid::new_v4().simple().to_string();
        let tmp = workspace.join(format!(".tmp-{}-{}", stage, id));
        let target = self.stage_dir(stage);

        debug!(
            "Saving stage {} ({} files) to {}",
            stage,
            snapshot.files.len(),
            target.display()
        );

        if let Err(e) = self.write_stage_dir(&tmp, snapshot).await {
            let _ = tokio::fs::remove_dir_all(&tmp).await;
            return Err(e);
        }

        let backup = if tokio::fs::try_exists(&target)
            .await
            .map_err(|e| PipelineError::io(&target, e))?
        {
            let backup = workspace.join(format!(".old-{}-{}", stage, id));
            tokio::fs::rename(&target, &backup)
                .await
                .map_err(|e| PipelineError::io(&target, e))?;
            Some(backup)
        } else {
            None
        };

        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| PipelineError::io(&target, e))?;

        if let Some(backup) = backup {
            if let Err(e) = tokio::fs::remove_dir_all(&backup).await {
                // The next load removes it
                warn!("Could not remove {}: {}", backup.display(), e);
            }
        }
        Ok(())
    }

    async fn write_main_spec(&self, text: &str) -> Result<()> {
        write_atomic(&self.main_spec_path(), text.as_bytes()).await
    }
}

/// Read every file under `dir` keyed by its `/`-separated relative path
async fn read_tree(dir: &Path) -> Result<FilesDict> {
    let mut files = FilesDict::new();
    let mut pending = vec![(dir.to_path_buf(), String::new())];

    while let Some((current, prefix)) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(PipelineError::io(&current, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(&current, e))?
        {
            let name = entry.file_name().into_string().map_err(|raw| {
                PipelineError::Serialization(format!("non UTF-8 file name {:?}", raw))
            })?;
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PipelineError::io(&path, e))?;

            if file_type.is_dir() {
                pending.push((path, relative));
            } else {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| PipelineError::io(&path, e))?;
                files.insert(relative, content);
            }
        }
    }
    Ok(files)
}
