//! Step domain model
//!
//! Every step reduces to one interface: given its input stage and a seed
//! conversation, produce an output stage and the full conversation. An empty
//! seed means a live run against the model; a non-empty seed is replayed and
//! only its final assistant message is parsed, so the same transcript always
//! derives the same output.

use crate::agent::TokenUsage;
use crate::core::context::{StepContext, StepInput};
use crate::core::conversation::{Conversation, Message, Role};
use crate::core::error::{PipelineError, Result};
use crate::core::parser::parse_files;
use crate::core::project::{FilesDict, Stage, StageSnapshot};
use tracing::{debug, info};

/// File the clarify step must produce
pub const CLARIFIED_SPEC_FILE: &str = "spec.md";

/// File the entrypoint step must produce
pub const ENTRYPOINT_FILE: &str = "run.sh";

const FINALIZE_CLARIFICATION: &str = "\
Stop asking questions. Make reasonable assumptions for anything still unclear, \
state them, and write the complete clarified specification as spec.md now.";

const ASSUME_INSTEAD: &str = "\
No answer was given. Make your own assumptions and state them explicitly.";

/// The closed set of pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Discuss the specification with the human, then write `spec.md`
    Clarify,
    /// Write the codebase from the given stage
    Generate { source: Stage },
    /// Add `run.sh` to the generated codebase
    Entrypoint,
}

/// Result of one step execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Content for the step's output stage
    pub output: StageSnapshot,

    /// Full transcript, seed included
    pub conversation: Conversation,

    /// Tokens spent on live model calls
    pub usage: TokenUsage,

    /// True when no model call was made
    pub replayed: bool,
}

impl StepKind {
    /// Name used as the log key
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Clarify => "clarify",
            StepKind::Generate { .. } => "generate",
            StepKind::Entrypoint => "entrypoint",
        }
    }

    pub fn input_stage(&self) -> Stage {
        match self {
            StepKind::Clarify => Stage::Raw,
            StepKind::Generate { source } => *source,
            StepKind::Entrypoint => Stage::Generated,
        }
    }

    pub fn output_stage(&self) -> Stage {
        match self {
            StepKind::Clarify => Stage::Clarified,
            StepKind::Generate { .. } => Stage::Generated,
            StepKind::Entrypoint => Stage::Final,
        }
    }

    /// Run the step live (empty seed) or replay the seed conversation
    pub async fn execute(
        &self,
        input: &StepInput,
        seed: Conversation,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome> {
        if !seed.is_empty() {
            debug!("Replaying {} messages for step {}", seed.len(), self.name());
            self.check_shape(&seed)?;
            let output = self.derive(input, &seed)?;
            return Ok(StepOutcome {
                output,
                conversation: seed,
                usage: TokenUsage::default(),
                replayed: true,
            });
        }

        info!("Executing step: {}", self.name());
        let mut conversation = Conversation::new();
        conversation.push(Message::system(ctx.preprompts.system_for(self.name())));
        conversation.push(Message::user(self.request(input)));

        match self {
            StepKind::Clarify => self.clarify(input, conversation, ctx).await,
            StepKind::Generate { .. } | StepKind::Entrypoint => {
                let reply = ctx.send(&conversation).await?;
                conversation.push(Message::assistant(reply.content));
                let output = self.derive(input, &conversation)?;
                Ok(StepOutcome {
                    output,
                    conversation,
                    usage: reply.usage.unwrap_or_default(),
                    replayed: false,
                })
            }
        }
    }

    /// Pure derivation of the output stage from input and transcript
    pub fn derive(&self, input: &StepInput, conversation: &Conversation) -> Result<StageSnapshot> {
        let reply = &conversation.final_assistant()?.content;
        let parsed = parse_files(reply)?;

        match self {
            StepKind::Clarify => {
                let spec = parsed.get(CLARIFIED_SPEC_FILE).ok_or_else(|| {
                    PipelineError::MalformedResponse(format!(
                        "clarification did not produce {}",
                        CLARIFIED_SPEC_FILE
                    ))
                })?;
                let mut files = FilesDict::new();
                files.insert(CLARIFIED_SPEC_FILE.to_string(), spec.clone());
                // system, user, then one (assistant, user) pair per question
                let rounds = conversation.len().saturating_sub(3) / 2;
                Ok(StageSnapshot::new(files).with_memory("clarification_rounds", rounds.to_string()))
            }
            StepKind::Generate { .. } => {
                let file_list = parsed.keys().cloned().collect::<Vec<_>>().join("\n");
                Ok(StageSnapshot::new(parsed).with_memory("file_list", file_list))
            }
            StepKind::Entrypoint => {
                if !parsed.contains_key(ENTRYPOINT_FILE) {
                    return Err(PipelineError::MalformedResponse(format!(
                        "entrypoint reply did not contain {}",
                        ENTRYPOINT_FILE
                    )));
                }
                let mut files = input.stage.files.clone();
                files.extend(parsed);
                Ok(StageSnapshot::new(files).with_memory("entrypoint", ENTRYPOINT_FILE))
            }
        }
    }

    /// Check that a transcript has the message shape this step produces
    pub fn check_shape(&self, conversation: &Conversation) -> Result<()> {
        let roles = conversation.roles();
        let fits = match self {
            StepKind::Clarify => {
                roles.len() >= 3
                    && roles.len() % 2 == 1
                    && roles[0] == Role::System
                    && roles[1..].iter().enumerate().all(|(i, role)| {
                        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
                        *role == expected
                    })
            }
            StepKind::Generate { .. } | StepKind::Entrypoint => {
                roles == [Role::System, Role::User, Role::Assistant]
            }
        };

        if fits {
            Ok(())
        } else {
            Err(PipelineError::InvalidEdit(format!(
                "conversation shape {:?} does not fit step '{}'",
                roles,
                self.name()
            )))
        }
    }

    fn request(&self, input: &StepInput) -> String {
        match self {
            StepKind::Entrypoint => {
                let file_list = input
                    .stage
                    .memory
                    .get("file_list")
                    .cloned()
                    .unwrap_or_else(|| {
                        input.stage.files.keys().cloned().collect::<Vec<_>>().join("\n")
                    });
                format!(
                    "The codebase consists of these files:\n{}\n\n{}",
                    file_list,
                    input.render_request()
                )
            }
            _ => input.render_request(),
        }
    }

    async fn clarify(
        &self,
        input: &StepInput,
        mut conversation: Conversation,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome> {
        let mut usage = TokenUsage::default();
        let mut questions = 0;
        let mut forced = false;

        loop {
            let reply = ctx.send(&conversation).await?;
            usage += reply.usage.unwrap_or_default();
            let question = reply.content.clone();
            conversation.push(Message::assistant(reply.content));

            match self.derive(input, &conversation) {
                Ok(output) => {
                    info!("Clarification finished after {} question(s)", questions);
                    return Ok(StepOutcome {
                        output,
                        conversation,
                        usage,
                        replayed: false,
                    });
                }
                Err(e) if forced => return Err(e),
                Err(_) if questions >= ctx.max_clarify_rounds => {
                    debug!("Clarification limit reached, asking model to finalize");
                    conversation.push(Message::user(FINALIZE_CLARIFICATION));
                    forced = true;
                }
                Err(_) => {
                    let answer = ctx
                        .human
                        .answer(&question)
                        .await
                        .filter(|a| !a.trim().is_empty())
                        .unwrap_or_else(|| ASSUME_INSTEAD.to_string());
                    conversation.push(Message::user(answer));
                    questions += 1;
                }
            }
        }
    }
}
