//! Pipeline runner - drives a project through its steps and resumes after
//! interruption

use crate::agent::{HumanInput, ModelExecutor, TokenUsage};
use crate::core::preprompts::Preprompts;
use crate::core::{
    Conversation, Pipeline, PipelineError, Project, Result, RunRecord, Stage, StepContext,
    StepInput, StepKind, StepRecord, MAIN_SPEC_FILE,
};
use crate::persistence::{InteractionLog, LogStore, StateStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum RunEvent {
    PipelineStarted {
        mode: String,
        steps: Vec<String>,
        resume_at: Option<usize>,
    },
    StepSkipped {
        step: String,
    },
    StepStarted {
        step: String,
        index: usize,
        total: usize,
    },
    StepCommitted {
        step: String,
        run_index: u32,
        stage: Stage,
        files: Vec<String>,
    },
    StepHalted {
        step: String,
        kind: &'static str,
        error: String,
    },
    PipelineCompleted {
        executed: usize,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// What a finished `run` did
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Steps executed live, with their committed run index
    pub executed: Vec<(String, u32)>,
    /// Steps already committed before this run
    pub skipped: Vec<String>,
    pub usage: TokenUsage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// True when the project was already complete
    pub fn was_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Executes the pipeline against one project
pub struct PipelineRunner {
    pipeline: Pipeline,
    state: Arc<dyn StateStore>,
    log: InteractionLog,
    model: Arc<dyn ModelExecutor>,
    human: Arc<dyn HumanInput>,
    preprompts: Preprompts,
    max_clarify_rounds: u32,
    event_handlers: Vec<EventHandler>,
}

impl PipelineRunner {
    pub fn new(
        pipeline: Pipeline,
        state: Arc<dyn StateStore>,
        logs: Arc<dyn LogStore>,
        model: Arc<dyn ModelExecutor>,
        human: Arc<dyn HumanInput>,
    ) -> Self {
        Self {
            pipeline,
            state,
            log: InteractionLog::new(logs),
            model,
            human,
            preprompts: Preprompts::builtin(),
            max_clarify_rounds: 5,
            event_handlers: Vec::new(),
        }
    }

    pub fn with_preprompts(mut self, preprompts: Preprompts) -> Self {
        self.preprompts = preprompts;
        self
    }

    pub fn with_max_clarify_rounds(mut self, rounds: u32) -> Self {
        self.max_clarify_rounds = rounds;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(RunEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: RunEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Committed runs of every pipeline step, in pipeline order
    pub async fn run_record(&self) -> Result<RunRecord> {
        let mut steps = Vec::with_capacity(self.pipeline.len());
        for step in &self.pipeline.steps {
            steps.push(StepRecord {
                name: step.name().to_string(),
                runs: self.log.run_indices(step.name()).await?,
            });
        }
        Ok(RunRecord::new(steps))
    }

    /// Run every step from the resume point to the end of the pipeline
    pub async fn run(&mut self) -> Result<RunReport> {
        self.run_steps(None).await
    }

    /// Re-execute `step_name` and every later step live, each committed under
    /// a new run index. Earlier steps are only run if they were never
    /// committed.
    pub async fn run_from(&mut self, step_name: &str) -> Result<RunReport> {
        let (index, _) = self.pipeline.step(step_name).ok_or_else(|| {
            PipelineError::NotFound(format!(
                "step '{}' is not part of the {} pipeline ({})",
                step_name,
                self.pipeline.mode,
                self.pipeline.names().join(", ")
            ))
        })?;
        self.run_steps(Some(index)).await
    }

    async fn run_steps(&mut self, from: Option<usize>) -> Result<RunReport> {
        let started_at = Utc::now();
        let mut project = self.state.load().await?;

        if project.stage(Stage::Raw).is_none() {
            info!("Initialising raw stage from main specification");
            let raw = Project::raw_snapshot(&project.main_spec);
            self.state.save(Stage::Raw, &raw).await?;
            project.stages.insert(Stage::Raw, raw);
        }

        // Steps read the specification captured in the raw stage, not later
        // edits to the prompt file
        let main_spec = project
            .stage(Stage::Raw)
            .and_then(|raw| raw.files.get(MAIN_SPEC_FILE).cloned())
            .unwrap_or_else(|| project.main_spec.clone());

        let record = self.run_record().await?;
        let resume_at = match (record.resume_index(), from) {
            (Some(resume), Some(from)) => Some(resume.min(from)),
            (resume, from) => resume.or(from),
        };

        info!(
            "Starting {} pipeline for {} ({} of {} steps committed)",
            self.pipeline.mode,
            project.path.display(),
            record.completed_steps(),
            self.pipeline.len()
        );
        self.emit_event(RunEvent::PipelineStarted {
            mode: self.pipeline.mode.to_string(),
            steps: self.pipeline.names().iter().map(|s| s.to_string()).collect(),
            resume_at,
        });

        let mut report = RunReport {
            executed: Vec::new(),
            skipped: Vec::new(),
            usage: TokenUsage::default(),
            started_at,
            finished_at: started_at,
        };

        let start = resume_at.unwrap_or(self.pipeline.len());
        let steps = self.pipeline.steps.clone();
        let total = steps.len();

        for (index, step) in steps.iter().enumerate() {
            let name = step.name();
            if index < start {
                report.skipped.push(name.to_string());
                self.emit_event(RunEvent::StepSkipped {
                    step: name.to_string(),
                });
                continue;
            }

            self.emit_event(RunEvent::StepStarted {
                step: name.to_string(),
                index,
                total,
            });

            match self.run_step(step, &main_spec, &mut project).await {
                Ok((run_index, usage)) => {
                    report.executed.push((name.to_string(), run_index));
                    report.usage += usage;
                }
                Err(e) => {
                    error!("Step {} halted: {}", name, e);
                    self.emit_event(RunEvent::StepHalted {
                        step: name.to_string(),
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                    return Err(PipelineError::halted(name, e));
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Pipeline finished: {} executed, {} skipped",
            report.executed.len(),
            report.skipped.len()
        );
        self.emit_event(RunEvent::PipelineCompleted {
            executed: report.executed.len(),
        });
        Ok(report)
    }

    /// Execute one step live, save its stage, then commit its log
    async fn run_step(
        &mut self,
        step: &StepKind,
        main_spec: &str,
        project: &mut Project,
    ) -> Result<(u32, TokenUsage)> {
        let name = step.name();
        let input_stage = project.stage(step.input_stage()).cloned().ok_or_else(|| {
            PipelineError::NotFound(format!(
                "input stage '{}' for step '{}'",
                step.input_stage(),
                name
            ))
        })?;
        let input = StepInput::new(main_spec, input_stage);

        let outcome = {
            let ctx = StepContext::new(self.model.as_ref(), self.human.as_ref(), &self.preprompts)
                .with_max_clarify_rounds(self.max_clarify_rounds);
            step.execute(&input, Conversation::new(), &ctx).await?
        };

        self.log.extend(name, &outcome.conversation);
        let output_stage = step.output_stage();
        if let Err(e) = self.state.save(output_stage, &outcome.output).await {
            self.log.discard(name);
            return Err(e);
        }
        let run_index = self.log.commit(name).await?;

        let files = outcome.output.files.keys().cloned().collect();
        project.stages.insert(output_stage, outcome.output);
        self.emit_event(RunEvent::StepCommitted {
            step: name.to_string(),
            run_index,
            stage: output_stage,
            files,
        });
        Ok((run_index, outcome.usage))
    }
}
