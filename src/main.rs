use anyhow::{Context, Result};
use codegen_pipeline::agent::{model_from_config, HumanInput, SilentHuman};
use codegen_pipeline::cli::commands::{LogCommand, RerunCommand, RunCommand, StatusCommand};
use codegen_pipeline::cli::output::*;
use codegen_pipeline::cli::terminal::TerminalHuman;
use codegen_pipeline::cli::{Cli, Command};
use codegen_pipeline::core::config::ProjectConfig;
use codegen_pipeline::core::preprompts::Preprompts;
use codegen_pipeline::core::{Conversation, Pipeline, PipelineError, MAIN_SPEC_FILE};
use codegen_pipeline::execution::{PipelineRunner, RerunTool};
use codegen_pipeline::persistence::{FsLogStore, FsStateStore, LogStore, StateStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let outcome = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await,
        Command::Rerun(cmd) => rerun_step(cmd, &cli).await,
        Command::Status(cmd) => show_status(cmd, &cli).await,
        Command::Log(cmd) => show_log(cmd).await,
    };

    if let Err(e) = outcome {
        // Pipeline errors print their step and kind; anything else is anyhow's
        if let Some(pipeline_error) = e.downcast_ref::<PipelineError>() {
            report_failure(pipeline_error);
            std::process::exit(1);
        }
        return Err(e);
    }
    Ok(())
}

fn report_failure(err: &PipelineError) {
    error!("{}", err);
    match err.halted_step() {
        Some(step) => eprintln!(
            "\n{} Step {} halted: {} ({})",
            CROSS,
            style(step).bold(),
            style(err.kind()).red(),
            err.root()
        ),
        None => eprintln!("\n{} {}: {}", CROSS, style(err.kind()).red(), err),
    }
}

fn load_config(project: &Path, cli: &Cli) -> Result<ProjectConfig, PipelineError> {
    ProjectConfig::load(project, cli.config.as_deref())
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let state = Arc::new(FsStateStore::new(&cmd.project));

    if let Some(prompt) = &cmd.prompt {
        let spec_path = cmd.project.join(MAIN_SPEC_FILE);
        if spec_path.exists() {
            println!(
                "{} {} already exists, ignoring --prompt",
                WARN,
                style(spec_path.display()).dim()
            );
        } else {
            state.write_main_spec(prompt).await?;
            println!("{} Wrote {}", INFO, style(spec_path.display()).dim());
        }
    }

    // Fail on a missing project before pinning anything into it
    state.load().await?;
    let layered = ProjectConfig::layered(cli.config.as_deref())?;
    let mode =
        ProjectConfig::pin_mode(&cmd.project, cmd.mode.map(Into::into), layered.mode).await?;
    let config = load_config(&cmd.project, cli)?;
    let preprompts = Preprompts::load(&cmd.project, config.use_custom_preprompts).await?;

    let human: Arc<dyn HumanInput> = if cmd.non_interactive {
        Arc::new(SilentHuman)
    } else {
        Arc::new(TerminalHuman::new())
    };
    let model = Arc::new(model_from_config(&config.model));
    let logs: Arc<dyn LogStore> = Arc::new(FsLogStore::new(&cmd.project));

    let mut runner = PipelineRunner::new(Pipeline::for_mode(mode), state, logs, model, human)
        .with_preprompts(preprompts)
        .with_max_clarify_rounds(config.max_clarify_rounds);

    let display = Arc::new(RunDisplay::new());
    let handler_display = display.clone();
    runner.add_event_handler(move |event| handler_display.handle(&event));

    let report = match &cmd.from {
        Some(step) => runner.run_from(step).await?,
        None => runner.run().await?,
    };

    if report.was_noop() {
        println!("{} Nothing to do, every step is committed", INFO);
    } else {
        println!("{}", format_usage(&report.usage));
        let elapsed = report.finished_at - report.started_at;
        println!(
            "\n{} {} in {}s",
            CHECK,
            style("Pipeline complete").green(),
            elapsed.num_seconds()
        );
    }
    Ok(())
}

async fn rerun_step(cmd: &RerunCommand, cli: &Cli) -> Result<()> {
    let config = load_config(&cmd.project, cli)?;
    let mut tool = RerunTool::new(
        Pipeline::for_mode(config.mode),
        Arc::new(FsStateStore::new(&cmd.project)),
        Arc::new(FsLogStore::new(&cmd.project)),
    );

    let report = match &cmd.conversation {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let edited = Conversation::from_log_str(&text)?;
            tool.rerun(&cmd.step, edited).await
        }
        None => tool.rerun_latest(&cmd.step).await,
    }
    .map_err(|e| PipelineError::halted(&cmd.step, e))?;

    println!(
        "{} {} → {} ({} files) {}",
        CHECK,
        style(&report.step).green(),
        style(report.stage).bold(),
        report.files.len(),
        style(format!("logs/{}/{}.json", report.step, report.run_index)).dim()
    );
    for file in &report.files {
        println!("    {}", file);
    }
    Ok(())
}

async fn show_status(cmd: &StatusCommand, cli: &Cli) -> Result<()> {
    let config = load_config(&cmd.project, cli)?;
    let state: Arc<dyn StateStore> = Arc::new(FsStateStore::new(&cmd.project));
    let project = state.load().await?;

    let runner = PipelineRunner::new(
        Pipeline::for_mode(config.mode),
        state,
        Arc::new(FsLogStore::new(&cmd.project)),
        Arc::new(model_from_config(&config.model)),
        Arc::new(SilentHuman),
    );
    let record = runner.run_record().await?;

    if cmd.json {
        let stages: Vec<_> = project.stages.keys().map(|s| s.to_string()).collect();
        let data = serde_json::json!({
            "project": project.path,
            "mode": config.mode,
            "complete": record.is_complete(),
            "steps": record.steps,
            "stages": stages,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!(
        "{} {} ({} mode)",
        INFO,
        style(project.path.display()).bold(),
        config.mode
    );
    println!("{}", format_run_record(&record));
    Ok(())
}

async fn show_log(cmd: &LogCommand) -> Result<()> {
    let logs = FsLogStore::new(&cmd.project);
    let index = match cmd.index {
        Some(index) => index,
        None => logs
            .run_indices(&cmd.step)
            .await?
            .last()
            .copied()
            .ok_or_else(|| {
                PipelineError::NotFound(format!("no committed log for step '{}'", cmd.step))
            })?,
    };
    let conversation = logs.read(&cmd.step, index).await?;

    if cmd.json {
        print!("{}", conversation.to_log_string()?);
    } else {
        println!(
            "{} {}",
            INFO,
            style(logs.log_path(&cmd.step, index).display()).dim()
        );
        println!("{}", format_conversation(&conversation));
    }
    Ok(())
}
