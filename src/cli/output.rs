//! CLI output formatting

use crate::agent::TokenUsage;
use crate::core::{Conversation, Role, RunRecord, StepRecord, StepStatus};
use crate::execution::RunEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a spinner for a step waiting on the model
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a run event for display
pub fn format_run_event(event: &RunEvent) -> String {
    match event {
        RunEvent::PipelineStarted {
            mode,
            steps,
            resume_at,
        } => {
            let resume = match resume_at {
                Some(0) => String::new(),
                Some(index) => format!(" (resuming at {})", style(&steps[*index]).cyan()),
                None => format!(" ({})", style("already complete").dim()),
            };
            format!(
                "{} Running {} pipeline: {}{}",
                ROCKET,
                style(mode).bold(),
                steps.join(" → "),
                resume
            )
        }
        RunEvent::StepSkipped { step } => {
            format!("{} {} {}", SKIP, style(step).dim(), style("(committed)").dim())
        }
        RunEvent::StepStarted { step, index, total } => format!(
            "{} [{}/{}] {}",
            SPINNER,
            index + 1,
            total,
            style(step).cyan()
        ),
        RunEvent::StepCommitted {
            step,
            run_index,
            stage,
            files,
        } => format!(
            "{} {} → {} ({} {}) {}",
            CHECK,
            style(step).green(),
            style(stage).bold(),
            files.len(),
            if files.len() == 1 { "file" } else { "files" },
            style(format!("logs/{}/{}.json", step, run_index)).dim()
        ),
        RunEvent::StepHalted { step, kind, error } => format!(
            "{} {} {}: {}",
            CROSS,
            style(step).red(),
            style(kind).red().bold(),
            style(error).dim()
        ),
        RunEvent::PipelineCompleted { executed } => format!(
            "{} Pipeline complete ({} {} executed)",
            INFO,
            executed,
            if *executed == 1 { "step" } else { "steps" }
        ),
    }
}

/// Prints run events, with a spinner while a model call is in flight
#[derive(Default)]
pub struct RunDisplay {
    spinner: Mutex<Option<ProgressBar>>,
}

impl RunDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, event: &RunEvent) {
        self.finish_spinner();
        match event {
            // Clarify reads answers from the terminal, so no spinner there
            RunEvent::StepStarted { step, .. } if step != "clarify" => {
                let spinner = create_spinner(format_run_event(event));
                if let Ok(mut slot) = self.spinner.lock() {
                    *slot = Some(spinner);
                }
            }
            _ => println!("{}", format_run_event(event)),
        }
    }

    fn finish_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }
}

/// Format one step's committed runs
pub fn format_step_record(record: &StepRecord) -> String {
    match record.status() {
        StepStatus::Pending => format!("  {} {}", style("○").dim(), style(&record.name).dim()),
        StepStatus::Committed { latest, runs } => format!(
            "  {} {} {}",
            style("●").green(),
            style(&record.name).bold(),
            style(format!(
                "({} {}, latest {})",
                runs,
                if runs == 1 { "run" } else { "runs" },
                latest
            ))
            .dim()
        ),
    }
}

/// Format a run record as a progress summary
pub fn format_run_record(record: &RunRecord) -> String {
    let mut out = format!(
        "{} ({}/{})",
        style(format!("{:.0}%", record.progress() * 100.0)).cyan(),
        record.completed_steps(),
        record.steps.len()
    );
    for step in &record.steps {
        out.push('\n');
        out.push_str(&format_step_record(step));
    }
    out
}

/// Format a conversation for reading in the terminal
pub fn format_conversation(conversation: &Conversation) -> String {
    let mut out = String::new();
    for message in &conversation.messages {
        let role = match message.role {
            Role::System => style(message.role.to_string()).dim(),
            Role::User => style(message.role.to_string()).cyan(),
            Role::Assistant => style(message.role.to_string()).green(),
        };
        out.push_str(&format!("── {} ──\n{}\n\n", role.bold(), message.content.trim_end()));
    }
    out
}

/// Format token usage for the end-of-run summary
pub fn format_usage(usage: &TokenUsage) -> String {
    format!(
        "{} Tokens: {} prompt, {} completion, {} total",
        INFO,
        style(usage.prompt_tokens).cyan(),
        style(usage.completion_tokens).cyan(),
        style(usage.total_tokens).bold()
    )
}
