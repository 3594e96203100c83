//! Project domain model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Filename to file content, ordered by filename
pub type FilesDict = BTreeMap<String, String>;

/// Step-local derived artifacts, keyed by name
pub type StepMemory = BTreeMap<String, String>;

/// Name of the main specification file at the project root
pub const MAIN_SPEC_FILE: &str = "prompt";

/// Workspace stage, ordered by position in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// The main specification as captured at pipeline start
    Raw,
    /// Specification after clarification with the human
    Clarified,
    /// Generated code
    Generated,
    /// Generated code plus entrypoint
    Final,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Raw, Stage::Clarified, Stage::Generated, Stage::Final];

    /// Directory name under `workspace/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Clarified => "clarified",
            Stage::Generated => "generated",
            Stage::Final => "final",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.dir_name() == s)
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

/// Files and memory of one stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub files: FilesDict,
    #[serde(default)]
    pub memory: StepMemory,
}

impl StageSnapshot {
    pub fn new(files: FilesDict) -> Self {
        Self {
            files,
            memory: StepMemory::new(),
        }
    }

    pub fn with_memory(mut self, key: &str, value: impl Into<String>) -> Self {
        self.memory.insert(key.to_string(), value.into());
        self
    }
}

/// Top-level unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Project root
    pub path: PathBuf,

    /// Main specification text
    pub main_spec: String,

    /// Persisted stages
    pub stages: BTreeMap<Stage, StageSnapshot>,
}

impl Project {
    pub fn new(path: impl Into<PathBuf>, main_spec: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            main_spec: main_spec.into(),
            stages: BTreeMap::new(),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageSnapshot> {
        self.stages.get(&stage)
    }

    /// Raw stage content for a freshly captured specification
    pub fn raw_snapshot(main_spec: &str) -> StageSnapshot {
        let mut files = FilesDict::new();
        files.insert(MAIN_SPEC_FILE.to_string(), main_spec.to_string());
        StageSnapshot::new(files)
    }
}
