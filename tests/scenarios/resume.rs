//! Test: resuming interrupted and completed runs

use crate::helpers::*;
use codegen_pipeline::core::{PipelineMode, Stage, StageSnapshot};
use codegen_pipeline::persistence::StateStore;

#[tokio::test]
async fn test_resume_after_halt_skips_committed_steps() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;

    // The model goes away after clarification
    let err = project
        .run(PipelineMode::Full, &[SPEC_REPLY])
        .await
        .unwrap_err();
    assert_eq!(err.halted_step(), Some("generate"));
    assert!(project.log_file("clarify", 0).exists());
    assert!(!project.log_file("generate", 0).exists());
    let clarify_log = std::fs::read(project.log_file("clarify", 0)).unwrap();

    let model = ScriptedModel::new(&[MAIN_PY_REPLY, RUN_SH_REPLY]);
    let human = ScriptedHuman::new(&[]);
    let report = project
        .runner(PipelineMode::Full, model.clone(), human.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.skipped, vec!["clarify"]);
    assert_eq!(
        report.executed,
        vec![("generate".to_string(), 0), ("entrypoint".to_string(), 0)]
    );
    // Clarify's model was never called again
    assert_eq!(model.calls(), 2);
    assert!(human.questions().is_empty());
    assert!(!project.log_file("clarify", 1).exists());
    assert_eq!(std::fs::read(project.log_file("clarify", 0)).unwrap(), clarify_log);
}

#[tokio::test]
async fn test_complete_project_is_noop() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    project
        .run(PipelineMode::Standard, &[MAIN_PY_REPLY, RUN_SH_REPLY])
        .await
        .unwrap();
    let before = project.tree();

    let model = ScriptedModel::new(&[]);
    let report = project
        .runner(PipelineMode::Standard, model.clone(), ScriptedHuman::new(&[]))
        .run()
        .await
        .unwrap();

    assert!(report.was_noop());
    assert_eq!(model.calls(), 0);
    assert_eq!(project.tree(), before);
}

#[tokio::test]
async fn test_saved_stage_without_log_reexecutes() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    project
        .run(PipelineMode::Standard, &[MAIN_PY_REPLY, RUN_SH_REPLY])
        .await
        .unwrap();

    // Crash between saving the final stage and committing its log
    std::fs::remove_file(project.log_file("entrypoint", 0)).unwrap();
    project
        .state
        .save(
            Stage::Final,
            &StageSnapshot::new([("half.txt".to_string(), "x\n".to_string())].into()),
        )
        .await
        .unwrap();

    let model = ScriptedModel::new(&[RUN_SH_REPLY]);
    let report = project
        .runner(PipelineMode::Standard, model.clone(), ScriptedHuman::new(&[]))
        .run()
        .await
        .unwrap();

    assert_eq!(report.executed, vec![("entrypoint".to_string(), 0)]);
    assert_eq!(model.calls(), 1);
    let state = project.load().await;
    assert_eq!(
        state.stage(Stage::Final).unwrap().files.keys().collect::<Vec<_>>(),
        vec!["main.py", "run.sh"]
    );
}

#[tokio::test]
async fn test_steps_read_spec_captured_at_start() {
    let project = TestProject::new("Reverse a string.").await;
    project
        .run(PipelineMode::Standard, &[MAIN_PY_REPLY])
        .await
        .unwrap_err();

    // Editing the prompt file after the raw stage exists does not leak into
    // later steps
    std::fs::write(project.root.join("prompt"), "Sort a list.").unwrap();
    let model = ScriptedModel::new(&[RUN_SH_REPLY]);
    project
        .runner(PipelineMode::Standard, model.clone(), ScriptedHuman::new(&[]))
        .run()
        .await
        .unwrap();

    let request = &model.seen()[0].messages[1].content;
    assert!(request.contains("Reverse a string."));
    assert!(!request.contains("Sort a list."));
}

/// Two runners on one project are not coordinated. Sequential use is fine;
/// callers must not start a second runner while one is active.
#[tokio::test]
async fn test_single_writer_sequential_runners_share_state() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;

    let first = project
        .run(PipelineMode::Standard, &[MAIN_PY_REPLY])
        .await;
    assert!(first.is_err());

    let second = project
        .run(PipelineMode::Standard, &[RUN_SH_REPLY])
        .await
        .unwrap();
    assert_eq!(second.skipped, vec!["generate"]);
    assert_eq!(second.executed, vec![("entrypoint".to_string(), 0)]);
}
