//! Core domain models
//!
//! This module defines the project, conversation and step types, the
//! reply parser, and configuration.

pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod preprompts;
pub mod project;
pub mod state;
pub mod step;

pub use context::*;
pub use conversation::*;
pub use error::{PipelineError, Result};
pub use pipeline::*;
pub use project::*;
pub use state::*;
pub use step::*;
