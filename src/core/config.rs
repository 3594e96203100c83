//! Layered configuration from YAML
//!
//! Resolution order, later layers winning: built-in defaults, the user file
//! (`<config dir>/codegen-pipeline/config.yaml`), an explicit `--config`
//! file, the project's `pipeline.yaml`, then command-line flags.

use crate::agent::ModelClientConfig;
use crate::core::error::{PipelineError, Result};
use crate::core::pipeline::PipelineMode;
use crate::persistence::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "pipeline.yaml";

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Which fixed step list to run
    pub mode: PipelineMode,

    /// Model adapter settings
    pub model: ModelClientConfig,

    /// Questions the clarify step may ask before it must finalize
    pub max_clarify_rounds: u32,

    /// Copy built-in preprompts into the project and read them from there
    pub use_custom_preprompts: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            model: ModelClientConfig::default(),
            max_clarify_rounds: 5,
            use_custom_preprompts: false,
        }
    }
}

/// One configuration file; every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PipelineMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelLayer>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_clarify_rounds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_custom_preprompts: Option<bool>,
}

/// Model settings within a layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
}

impl ConfigLayer {
    /// Parse a layer from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Load a layer, `None` when the file does not exist
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        debug!("Loading config layer from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_yaml(&text)
            .map(Some)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Atomically write this layer as YAML
    pub async fn save(&self, path: &Path) -> Result<()> {
        let yaml =
            serde_yaml::to_string(self).map_err(|e| PipelineError::Serialization(e.to_string()))?;
        write_atomic(path, yaml.as_bytes()).await
    }
}

impl ProjectConfig {
    /// Overlay one layer onto this configuration
    pub fn apply(&mut self, layer: &ConfigLayer) {
        if let Some(mode) = layer.mode {
            self.mode = mode;
        }
        if let Some(rounds) = layer.max_clarify_rounds {
            self.max_clarify_rounds = rounds;
        }
        if let Some(custom) = layer.use_custom_preprompts {
            self.use_custom_preprompts = custom;
        }
        if let Some(model) = &layer.model {
            if let Some(command) = &model.command {
                self.model.command = command.clone();
            }
            if let Some(args) = &model.args {
                self.model.args = args.clone();
            }
            if let Some(timeout) = model.timeout_secs {
                self.model.timeout_secs = timeout;
            }
            if let Some(retries) = model.max_retries {
                self.model.max_retries = retries;
            }
            if let Some(backoff) = model.retry_backoff_ms {
                self.model.retry_backoff_ms = backoff;
            }
        }
    }

    /// Defaults, the user file and an explicit file, without any project layer
    pub fn layered(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user) = user_config_path() {
            if let Some(layer) = ConfigLayer::from_file(&user)? {
                config.apply(&layer);
            }
        }

        if let Some(path) = explicit {
            let layer = ConfigLayer::from_file(path)?.ok_or_else(|| {
                PipelineError::NotFound(format!("config file {}", path.display()))
            })?;
            config.apply(&layer);
        }

        Ok(config)
    }

    /// Resolve configuration for a project
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::layered(explicit)?;
        if let Some(layer) = ConfigLayer::from_file(&project_root.join(PROJECT_CONFIG_FILE))? {
            config.apply(&layer);
        }
        Ok(config)
    }

    /// Record the pipeline mode in the project so resumed runs use the same steps.
    ///
    /// A mode requested on the command line must agree with a pinned one. With
    /// nothing pinned and nothing requested, `fallback` (the mode resolved from
    /// the user and `--config` layers) is pinned.
    pub async fn pin_mode(
        project_root: &Path,
        requested: Option<PipelineMode>,
        fallback: PipelineMode,
    ) -> Result<PipelineMode> {
        let path = project_root.join(PROJECT_CONFIG_FILE);
        let mut layer = ConfigLayer::from_file(&path)?.unwrap_or_default();

        match (layer.mode, requested) {
            (Some(pinned), Some(requested)) if pinned != requested => {
                Err(PipelineError::Config(format!(
                    "project was started in '{}' mode, cannot continue in '{}' mode",
                    pinned, requested
                )))
            }
            (Some(pinned), _) => Ok(pinned),
            (None, requested) => {
                let mode = requested.unwrap_or(fallback);
                layer.mode = Some(mode);
                layer.save(&path).await?;
                debug!("Pinned pipeline mode '{}' in {}", mode, path.display());
                Ok(mode)
            }
        }
    }
}

/// User-level config file location
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("codegen-pipeline").join("config.yaml"))
}
