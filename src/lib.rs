//! codegen-pipeline - resumable code generation with replayable model transcripts

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use agent::{HumanInput, ModelError, ModelExecutor, ModelReply, TokenUsage};
pub use core::{Conversation, Message, Pipeline, PipelineError, PipelineMode, Role, Stage, StepKind};
pub use execution::{PipelineRunner, RerunTool, RunEvent, RunReport};
pub use persistence::{FsLogStore, FsStateStore, InteractionLog, LogStore, StateStore};
