//! Terminal human input for clarifying questions

use crate::agent::HumanInput;
use async_trait::async_trait;
use console::{style, Term};
use tracing::warn;

/// Answers clarifying questions from stdin
#[derive(Debug, Clone, Default)]
pub struct TerminalHuman;

impl TerminalHuman {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HumanInput for TerminalHuman {
    async fn answer(&self, question: &str) -> Option<String> {
        let question = question.trim().to_string();
        let result = tokio::task::spawn_blocking(move || {
            let term = Term::stdout();
            term.write_line("")?;
            term.write_line(&format!("{}", style(&question).yellow()))?;
            term.write_line(&format!(
                "{}",
                style("(answer, or press enter to let the model assume)").dim()
            ))?;
            term.write_str("> ")?;
            term.read_line()
        })
        .await;

        match result {
            Ok(Ok(line)) => Some(line),
            Ok(Err(e)) => {
                warn!("Could not read answer from terminal: {}", e);
                None
            }
            Err(e) => {
                warn!("Terminal input task failed: {}", e);
                None
            }
        }
    }
}
