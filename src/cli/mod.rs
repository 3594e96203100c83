//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal;

use clap::{Parser, Subcommand};
use commands::{LogCommand, RerunCommand, RunCommand, StatusCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Resumable code generation from a natural-language specification
#[derive(Debug, Parser, Clone)]
#[command(name = "codegen")]
#[command(version = "0.1.0")]
#[command(about = "Turn a specification into a codebase, one replayable step at a time", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra configuration file, applied before <project>/pipeline.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the pipeline for a project
    Run(RunCommand),

    /// Re-execute one step from its edited conversation log
    Rerun(RerunCommand),

    /// Show step status for a project
    Status(StatusCommand),

    /// Print a step's conversation log
    Log(LogCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
