//! Test: halting on bad replies and unavailable models

use crate::helpers::*;
use codegen_pipeline::core::{PipelineError, PipelineMode, Stage};

#[tokio::test]
async fn test_malformed_reply_halts_without_writes() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    let err = project
        .run(
            PipelineMode::Lite,
            &["Sure! ```python\nprint('no filename')\n```"],
        )
        .await
        .unwrap_err();

    assert_eq!(err.halted_step(), Some("generate"));
    assert_eq!(err.kind(), "MalformedResponseError");
    assert!(!project.log_file("generate", 0).exists());
    assert!(project.load().await.stage(Stage::Generated).is_none());
}

#[tokio::test]
async fn test_unterminated_fence_is_malformed() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    let err = project
        .run(PipelineMode::Lite, &["main.py\n```python\nprint('hi')\n"])
        .await
        .unwrap_err();
    assert!(matches!(err.root(), PipelineError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_entrypoint_without_run_sh_halts() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    let err = project
        .run(
            PipelineMode::Standard,
            &[MAIN_PY_REPLY, "start.sh\n```sh\npython main.py\n```"],
        )
        .await
        .unwrap_err();

    assert_eq!(err.halted_step(), Some("entrypoint"));
    assert!(project.log_file("generate", 0).exists());
    assert!(project.load().await.stage(Stage::Final).is_none());
}

#[tokio::test]
async fn test_model_unavailable_halts() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    let err = project.run(PipelineMode::Lite, &[]).await.unwrap_err();

    assert_eq!(err.halted_step(), Some("generate"));
    assert_eq!(err.kind(), "ModelUnavailableError");
    assert!(err.to_string().contains("service unavailable"));
}

#[tokio::test]
async fn test_missing_project() {
    let dir = tempfile::tempdir().unwrap();
    let state = std::sync::Arc::new(codegen_pipeline::FsStateStore::new(dir.path().join("nope")));
    let logs = std::sync::Arc::new(codegen_pipeline::FsLogStore::new(dir.path().join("nope")));
    let mut runner = codegen_pipeline::PipelineRunner::new(
        codegen_pipeline::Pipeline::for_mode(PipelineMode::Lite),
        state,
        logs,
        ScriptedModel::new(&[]),
        ScriptedHuman::new(&[]),
    );

    let err = runner.run().await.unwrap_err();
    assert_eq!(err.kind(), "NotFoundError");
}
