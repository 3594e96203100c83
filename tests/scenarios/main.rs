//! Scenario-based tests against on-disk projects

mod helpers;

mod clarify_generate;
mod halts;
mod rerun;
mod resume;
