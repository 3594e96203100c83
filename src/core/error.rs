//! Error types for pipeline operations

use crate::agent::ModelError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Errors surfaced by `run` and `rerun`
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing project, specification, stage or log
    #[error("not found: {0}")]
    NotFound(String),

    /// The model adapter failed (transport, auth, timeout)
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The assistant reply did not match the file-block grammar
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// An edited conversation cannot be replayed
    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    /// A step halted the pipeline
    #[error("step '{step}' halted: {source}")]
    StepHalted {
        step: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn halted(step: &str, source: PipelineError) -> Self {
        PipelineError::StepHalted {
            step: step.to_string(),
            source: Box::new(source),
        }
    }

    /// Stable label for the error kind, printed by the CLI
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "NotFoundError",
            PipelineError::ModelUnavailable(_) => "ModelUnavailableError",
            PipelineError::MalformedResponse(_) => "MalformedResponseError",
            PipelineError::InvalidEdit(_) => "InvalidEditError",
            PipelineError::StepHalted { source, .. } => source.kind(),
            PipelineError::Io { .. } => "IoError",
            PipelineError::Serialization(_) => "SerializationError",
            PipelineError::Config(_) => "ConfigError",
        }
    }

    /// Name of the step that halted the run, if any
    pub fn halted_step(&self) -> Option<&str> {
        match self {
            PipelineError::StepHalted { step, .. } => Some(step),
            _ => None,
        }
    }

    /// The underlying error, looking through `StepHalted`
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::StepHalted { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        PipelineError::ModelUnavailable(err.to_string())
    }
}
