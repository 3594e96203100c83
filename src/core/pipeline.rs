//! Pipeline definition

use crate::core::project::Stage;
use crate::core::step::StepKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which fixed step list a project runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// generate only
    Lite,
    /// clarify, generate
    Clarify,
    /// generate, entrypoint
    #[default]
    Standard,
    /// clarify, generate, entrypoint
    Full,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Lite => "lite",
            PipelineMode::Clarify => "clarify",
            PipelineMode::Standard => "standard",
            PipelineMode::Full => "full",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lite" => Ok(PipelineMode::Lite),
            "clarify" => Ok(PipelineMode::Clarify),
            "standard" => Ok(PipelineMode::Standard),
            "full" => Ok(PipelineMode::Full),
            other => Err(format!("unknown pipeline mode '{}'", other)),
        }
    }
}

/// A fixed, linear sequence of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub mode: PipelineMode,
    pub steps: Vec<StepKind>,
}

impl Pipeline {
    /// The registered step list for a mode
    pub fn for_mode(mode: PipelineMode) -> Self {
        let steps = match mode {
            PipelineMode::Lite => vec![StepKind::Generate { source: Stage::Raw }],
            PipelineMode::Clarify => vec![
                StepKind::Clarify,
                StepKind::Generate {
                    source: Stage::Clarified,
                },
            ],
            PipelineMode::Standard => vec![
                StepKind::Generate { source: Stage::Raw },
                StepKind::Entrypoint,
            ],
            PipelineMode::Full => vec![
                StepKind::Clarify,
                StepKind::Generate {
                    source: Stage::Clarified,
                },
                StepKind::Entrypoint,
            ],
        };
        Self { mode, steps }
    }

    /// Find a step and its position by name
    pub fn step(&self, name: &str) -> Option<(usize, &StepKind)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
