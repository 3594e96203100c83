//! Test: rerun a step from an edited log

use crate::helpers::*;
use codegen_pipeline::core::{Conversation, Message, PipelineError, PipelineMode, Role, Stage};

async fn clarified_and_generated() -> TestProject {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    project
        .run(
            PipelineMode::Clarify,
            &["Unicode?", SPEC_REPLY, MAIN_PY_REPLY],
        )
        .await
        .unwrap();
    project
}

#[tokio::test]
async fn test_rerun_adds_tests_file() {
    let project = clarified_and_generated().await;
    let clarify_log = std::fs::read(project.log_file("clarify", 0)).unwrap();
    let clarified_before = project.load().await.stage(Stage::Clarified).cloned();

    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    let mut edited = tool.latest("generate").await.unwrap();
    let last = edited.messages.len() - 1;
    edited.messages[last].content.push_str(
        "\ntests.py\n```python\nimport subprocess\nassert subprocess.check_output(['python', 'main.py', 'ab']).strip() == b'ba'\n```\n",
    );

    let report = tool.rerun("generate", edited).await.unwrap();
    assert_eq!(report.run_index, 1);
    assert_eq!(report.stage, Stage::Generated);
    assert_eq!(report.files, vec!["main.py", "tests.py"]);

    // New log, history kept, upstream untouched
    assert!(project.log_file("generate", 1).exists());
    assert!(project.log_file("generate", 0).exists());
    assert!(!project.log_file("clarify", 1).exists());
    assert_eq!(std::fs::read(project.log_file("clarify", 0)).unwrap(), clarify_log);

    let state = project.load().await;
    let generated = state.stage(Stage::Generated).unwrap();
    assert_eq!(
        generated.files.keys().collect::<Vec<_>>(),
        vec!["main.py", "tests.py"]
    );
    assert!(generated.files["tests.py"].starts_with("import subprocess"));
    assert_eq!(state.stage(Stage::Clarified).cloned(), clarified_before);
}

#[tokio::test]
async fn test_identical_rerun_is_byte_identical() {
    let project = clarified_and_generated().await;
    let before = project.tree();

    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    let report = tool.rerun_latest("generate").await.unwrap();
    assert_eq!(report.run_index, 1);

    let after = project.tree();
    for (path, bytes) in &before {
        assert_eq!(after.get(path), Some(bytes), "{} changed", path);
    }
    // The only new file is the committed log
    let added: Vec<_> = after.keys().filter(|k| !before.contains_key(*k)).collect();
    assert_eq!(added, vec!["logs/generate/1.json"]);
    assert_eq!(
        after["logs/generate/1.json"],
        before["logs/generate/0.json"]
    );
}

#[tokio::test]
async fn test_rerun_clarify_does_not_regenerate() {
    let project = clarified_and_generated().await;
    let generated_before = project.load().await.stage(Stage::Generated).cloned();

    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    let mut edited = tool.latest("clarify").await.unwrap();
    let last = edited.messages.len() - 1;
    edited.messages[last].content =
        "spec.md\n```markdown\nReverse every argument.\n```\n".to_string();

    tool.rerun("clarify", edited).await.unwrap();

    let state = project.load().await;
    assert_eq!(
        state.stage(Stage::Clarified).unwrap().files["spec.md"],
        "Reverse every argument.\n"
    );
    assert_eq!(state.stage(Stage::Generated).cloned(), generated_before);
    assert!(!project.log_file("generate", 1).exists());
}

#[tokio::test]
async fn test_rerun_with_extra_message_is_invalid() {
    let project = clarified_and_generated().await;
    let before = project.tree();

    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    let mut edited = tool.latest("generate").await.unwrap();
    edited.push(Message::user("Also add a README."));

    let err = tool.rerun("generate", edited).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidEdit(_)));
    assert_eq!(project.tree(), before);
}

#[tokio::test]
async fn test_rerun_with_swapped_roles_is_invalid() {
    let project = clarified_and_generated().await;
    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    let mut edited = tool.latest("generate").await.unwrap();
    edited.messages[1].role = Role::Assistant;

    assert!(matches!(
        tool.rerun("generate", edited).await,
        Err(PipelineError::InvalidEdit(_))
    ));
}

#[tokio::test]
async fn test_rerun_malformed_edit_writes_nothing() {
    let project = clarified_and_generated().await;
    let before = project.tree();

    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    let mut edited = tool.latest("generate").await.unwrap();
    let last = edited.messages.len() - 1;
    edited.messages[last].content = "I changed my mind, no code.".to_string();

    let err = tool.rerun("generate", edited).await.unwrap_err();
    assert_eq!(err.kind(), "MalformedResponseError");
    assert_eq!(project.tree(), before);
}

#[tokio::test]
async fn test_rerun_unknown_step() {
    let project = clarified_and_generated().await;
    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    assert!(matches!(
        tool.rerun_latest("entrypoint").await,
        Err(PipelineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_hand_edited_log_is_replayed() {
    let project = clarified_and_generated().await;
    let path = project.log_file("generate", 0);
    let text = std::fs::read_to_string(&path)
        .unwrap()
        .replace("print(sys.argv[1][::-1])", "print(sys.argv[1].upper())");
    std::fs::write(&path, text).unwrap();

    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    tool.rerun_latest("generate").await.unwrap();

    let state = project.load().await;
    assert_eq!(
        state.stage(Stage::Generated).unwrap().files["main.py"],
        "import sys\nprint(sys.argv[1].upper())\n"
    );
}

#[tokio::test]
async fn test_rerun_then_run_from_propagates_downstream() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    project
        .run(PipelineMode::Standard, &[MAIN_PY_REPLY, RUN_SH_REPLY])
        .await
        .unwrap();
    let generate_log = std::fs::read(project.log_file("generate", 0)).unwrap();

    let mut tool = project.rerun_tool(PipelineMode::Standard);
    let mut edited = tool.latest("generate").await.unwrap();
    let last = edited.messages.len() - 1;
    edited.messages[last]
        .content
        .push_str("\ntests.py\n```python\nassert True\n```\n");
    tool.rerun("generate", edited).await.unwrap();

    // A plain run has nothing left to do
    let idle = ScriptedModel::new(&[]);
    let report = project
        .runner(PipelineMode::Standard, idle.clone(), ScriptedHuman::new(&[]))
        .run()
        .await
        .unwrap();
    assert!(report.was_noop());
    assert_eq!(idle.calls(), 0);

    let model = ScriptedModel::new(&[RUN_SH_REPLY]);
    let report = project
        .runner(PipelineMode::Standard, model.clone(), ScriptedHuman::new(&[]))
        .run_from("entrypoint")
        .await
        .unwrap();
    assert_eq!(report.skipped, vec!["generate"]);
    assert_eq!(report.executed, vec![("entrypoint".to_string(), 1)]);
    assert_eq!(model.calls(), 1);

    let state = project.load().await;
    assert_eq!(
        state.stage(Stage::Final).unwrap().files.keys().collect::<Vec<_>>(),
        vec!["main.py", "run.sh", "tests.py"]
    );
    assert!(project.log_file("entrypoint", 0).exists());
    assert!(project.log_file("entrypoint", 1).exists());
    assert!(!project.log_file("generate", 2).exists());
    assert_eq!(std::fs::read(project.log_file("generate", 0)).unwrap(), generate_log);
}

#[tokio::test]
async fn test_rerun_latest_checks_roles_against_previous_run() {
    let project = clarified_and_generated().await;
    let mut tool = project.rerun_tool(PipelineMode::Clarify);
    tool.rerun_latest("clarify").await.unwrap();

    // Drop the question and its answer from the newest log on disk
    let path = project.log_file("clarify", 1);
    let mut conversation =
        Conversation::from_log_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    conversation.messages.drain(2..4);
    std::fs::write(&path, conversation.to_log_string().unwrap()).unwrap();
    let before = project.tree();

    let err = tool.rerun_latest("clarify").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidEdit(_)));
    assert_eq!(project.tree(), before);
}
