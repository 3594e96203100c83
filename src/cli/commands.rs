//! CLI command definitions

use crate::core::PipelineMode;
use clap::Args;
use std::path::PathBuf;

/// Run the pipeline, resuming after the last committed step
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Project directory
    pub project: PathBuf,

    /// Step list to run; pinned in pipeline.yaml on first run
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Main specification text, written to <project>/prompt if absent
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Never ask clarifying questions interactively
    #[arg(long)]
    pub non_interactive: bool,

    /// Re-execute this step and every later one, even if already committed
    #[arg(long, value_name = "STEP")]
    pub from: Option<String>,
}

/// Re-derive one step from its edited log
#[derive(Debug, Args, Clone)]
pub struct RerunCommand {
    /// Project directory
    pub project: PathBuf,

    /// Step name (clarify, generate, entrypoint)
    pub step: String,

    /// Edited conversation to replay instead of the latest log
    #[arg(long)]
    pub conversation: Option<PathBuf>,
}

/// Show which steps are committed
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    /// Project directory
    pub project: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Print a committed conversation
#[derive(Debug, Args, Clone)]
pub struct LogCommand {
    /// Project directory
    pub project: PathBuf,

    /// Step name
    pub step: String,

    /// Run index (defaults to the latest)
    #[arg(short, long)]
    pub index: Option<u32>,

    /// Print the raw JSON log
    #[arg(long)]
    pub json: bool,
}

/// Pipeline mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    Lite,
    Clarify,
    Standard,
    Full,
}

impl From<ModeArg> for PipelineMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Lite => PipelineMode::Lite,
            ModeArg::Clarify => PipelineMode::Clarify,
            ModeArg::Standard => PipelineMode::Standard,
            ModeArg::Full => PipelineMode::Full,
        }
    }
}
