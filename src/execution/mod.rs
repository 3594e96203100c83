//! Pipeline execution: the runner and the rerun tool

pub mod engine;
pub mod rerun;

pub use engine::{EventHandler, PipelineRunner, RunEvent, RunReport};
pub use rerun::{RerunReport, RerunTool};
