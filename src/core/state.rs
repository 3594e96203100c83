//! Run record, derived from which step logs exist

use crate::core::pipeline::Pipeline;
use serde::{Deserialize, Serialize};

/// Committed runs of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    /// Committed run indices, ascending
    pub runs: Vec<u32>,
}

impl StepRecord {
    pub fn status(&self) -> StepStatus {
        match self.runs.last() {
            Some(latest) => StepStatus::Committed {
                latest: *latest,
                runs: self.runs.len(),
            },
            None => StepStatus::Pending,
        }
    }
}

/// Status of one step in a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// No committed log
    Pending,
    /// At least one committed log
    Committed { latest: u32, runs: usize },
}

/// Per-step view of a project's logs, in pipeline order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub steps: Vec<StepRecord>,
}

impl RunRecord {
    pub fn new(steps: Vec<StepRecord>) -> Self {
        Self { steps }
    }

    /// Index of the first step with no committed log
    pub fn resume_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.runs.is_empty())
    }

    pub fn is_complete(&self) -> bool {
        self.resume_index().is_none()
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.runs.is_empty()).count()
    }

    /// Progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.completed_steps() as f64 / self.steps.len() as f64
    }

    /// Check that the record describes the given pipeline
    pub fn matches(&self, pipeline: &Pipeline) -> bool {
        self.steps.len() == pipeline.len()
            && self
                .steps
                .iter()
                .zip(pipeline.steps.iter())
                .all(|(record, step)| record.name == step.name())
    }
}
