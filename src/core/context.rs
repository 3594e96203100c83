//! Step context - collaborators and inputs handed to a step

use crate::agent::{HumanInput, ModelExecutor, ModelReply};
use crate::core::conversation::Conversation;
use crate::core::error::Result;
use crate::core::preprompts::Preprompts;
use crate::core::project::{FilesDict, StageSnapshot, MAIN_SPEC_FILE};
use crate::core::parser::render_files;
use tracing::debug;

/// Collaborators available to a step while it runs
pub struct StepContext<'a> {
    pub model: &'a dyn ModelExecutor,
    pub human: &'a dyn HumanInput,
    pub preprompts: &'a Preprompts,
    pub max_clarify_rounds: u32,
}

impl<'a> StepContext<'a> {
    pub fn new(
        model: &'a dyn ModelExecutor,
        human: &'a dyn HumanInput,
        preprompts: &'a Preprompts,
    ) -> Self {
        Self {
            model,
            human,
            preprompts,
            max_clarify_rounds: 5,
        }
    }

    pub fn with_max_clarify_rounds(mut self, rounds: u32) -> Self {
        self.max_clarify_rounds = rounds;
        self
    }

    /// Ask the model for its next message
    pub async fn send(&self, conversation: &Conversation) -> Result<ModelReply> {
        debug!("Sending {} messages to model", conversation.len());
        Ok(self.model.send(conversation).await?)
    }
}

/// What a step reads from the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInput {
    /// Specification captured when the pipeline started
    pub main_spec: String,

    /// The step's input stage
    pub stage: StageSnapshot,
}

impl StepInput {
    pub fn new(main_spec: impl Into<String>, stage: StageSnapshot) -> Self {
        Self {
            main_spec: main_spec.into(),
            stage,
        }
    }

    /// Render the specification and input files for a user message
    pub fn render_request(&self) -> String {
        let mut body = format!("Specification:\n{}\n", self.main_spec.trim_end());

        let files: FilesDict = self
            .stage
            .files
            .iter()
            .filter(|(name, _)| name.as_str() != MAIN_SPEC_FILE)
            .map(|(name, content)| (name.clone(), content.clone()))
            .collect();
        let rendered = render_files(&files);
        if !rendered.is_empty() {
            body.push_str("\nFiles:\n\n");
            body.push_str(&rendered);
        }
        body
    }
}
