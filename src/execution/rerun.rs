//! Rerun tool - re-derive one step from an edited conversation

use crate::agent::{ModelError, ModelExecutor, ModelReply, SilentHuman};
use crate::core::preprompts::Preprompts;
use crate::core::{
    Conversation, Pipeline, PipelineError, Result, Stage, StepContext, StepInput, MAIN_SPEC_FILE,
};
use crate::persistence::{InteractionLog, LogStore, StateStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Outcome of one rerun
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerunReport {
    pub step: String,
    /// Index the edited conversation was committed under
    pub run_index: u32,
    pub stage: Stage,
    pub files: Vec<String>,
}

/// Model stand-in for replays, which never reach the model
struct ReplayOnly;

#[async_trait]
impl ModelExecutor for ReplayOnly {
    async fn send(&self, _conversation: &Conversation) -> Result<ModelReply, ModelError> {
        Err(ModelError::Internal(
            "replay attempted a model call".to_string(),
        ))
    }
}

/// Replays edited step logs against the persisted project
pub struct RerunTool {
    pipeline: Pipeline,
    state: Arc<dyn StateStore>,
    log: InteractionLog,
    preprompts: Preprompts,
}

impl RerunTool {
    pub fn new(pipeline: Pipeline, state: Arc<dyn StateStore>, logs: Arc<dyn LogStore>) -> Self {
        Self {
            pipeline,
            state,
            log: InteractionLog::new(logs),
            preprompts: Preprompts::builtin(),
        }
    }

    /// Latest committed conversation of a pipeline step
    pub async fn latest(&self, step_name: &str) -> Result<Conversation> {
        if self.pipeline.step(step_name).is_none() {
            return Err(self.unknown_step(step_name));
        }
        self.log.load(step_name, None).await
    }

    /// Replay the step's latest log as it currently reads on disk.
    ///
    /// The latest log is the edit itself here, so its roles are checked
    /// against the run before it. A step with a single run only gets the
    /// shape check.
    pub async fn rerun_latest(&mut self, step_name: &str) -> Result<RerunReport> {
        let conversation = self.latest(step_name).await?;
        let indices = self.log.run_indices(step_name).await?;
        let reference = match indices.len().checked_sub(2).map(|i| indices[i]) {
            Some(previous) => Some(self.log.load(step_name, Some(previous)).await?),
            None => None,
        };
        self.replay(step_name, conversation, reference).await
    }

    /// Re-derive the step's output stage from an edited conversation and
    /// commit it as a new run. Later steps are not re-run.
    pub async fn rerun(&mut self, step_name: &str, edited: Conversation) -> Result<RerunReport> {
        if self.pipeline.step(step_name).is_none() {
            return Err(self.unknown_step(step_name));
        }
        let latest = self.log.load(step_name, None).await?;
        self.replay(step_name, edited, Some(latest)).await
    }

    async fn replay(
        &mut self,
        step_name: &str,
        edited: Conversation,
        reference: Option<Conversation>,
    ) -> Result<RerunReport> {
        let (_, step) = self
            .pipeline
            .step(step_name)
            .ok_or_else(|| self.unknown_step(step_name))?;
        let step = *step;

        if let Some(reference) = reference {
            if edited.roles() != reference.roles() {
                return Err(PipelineError::InvalidEdit(format!(
                    "edited conversation has roles {:?}, committed log of '{}' has {:?}",
                    edited.roles(),
                    step_name,
                    reference.roles()
                )));
            }
        }
        step.check_shape(&edited)?;

        let project = self.state.load().await?;
        let input_stage = project.stage(step.input_stage()).cloned().ok_or_else(|| {
            PipelineError::NotFound(format!(
                "input stage '{}' for step '{}'",
                step.input_stage(),
                step_name
            ))
        })?;
        let main_spec = project
            .stage(Stage::Raw)
            .and_then(|raw| raw.files.get(MAIN_SPEC_FILE).cloned())
            .unwrap_or(project.main_spec);
        let input = StepInput::new(main_spec, input_stage);

        let outcome = {
            let ctx = StepContext::new(&ReplayOnly, &SilentHuman, &self.preprompts);
            step.execute(&input, edited, &ctx).await?
        };

        let stage = step.output_stage();
        self.state.save(stage, &outcome.output).await?;
        self.log.extend(step_name, &outcome.conversation);
        let run_index = self.log.commit(step_name).await?;

        info!(
            "Rerun of {} committed as run {} ({} files in {})",
            step_name,
            run_index,
            outcome.output.files.len(),
            stage
        );
        Ok(RerunReport {
            step: step_name.to_string(),
            run_index,
            stage,
            files: outcome.output.files.keys().cloned().collect(),
        })
    }

    fn unknown_step(&self, step_name: &str) -> PipelineError {
        PipelineError::NotFound(format!(
            "step '{}' is not part of the {} pipeline ({})",
            step_name,
            self.pipeline.mode,
            self.pipeline.names().join(", ")
        ))
    }
}
