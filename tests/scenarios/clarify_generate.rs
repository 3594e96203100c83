//! Test: clarify then generate, end to end on disk

use crate::helpers::*;
use codegen_pipeline::core::{Conversation, PipelineMode, Role, Stage};

#[tokio::test]
async fn test_clarify_then_generate() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    let model = ScriptedModel::new(&[
        "Should the tool handle unicode?",
        SPEC_REPLY,
        MAIN_PY_REPLY,
    ]);
    let human = ScriptedHuman::new(&["no"]);

    let report = project
        .runner(PipelineMode::Clarify, model.clone(), human.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.executed,
        vec![("clarify".to_string(), 0), ("generate".to_string(), 0)]
    );
    assert_eq!(model.calls(), 3);
    assert_eq!(human.questions(), vec!["Should the tool handle unicode?"]);
    assert_eq!(report.usage.total_tokens, 45);

    // Both logs committed as run 0
    assert!(project.log_file("clarify", 0).exists());
    assert!(project.log_file("generate", 0).exists());

    let clarify_log =
        Conversation::from_log_str(&std::fs::read_to_string(project.log_file("clarify", 0)).unwrap())
            .unwrap();
    assert_eq!(
        clarify_log.roles(),
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant
        ]
    );
    assert_eq!(clarify_log.messages[3].content, "no");

    let state = project.load().await;
    let generated = state.stage(Stage::Generated).unwrap();
    assert_eq!(generated.files.keys().collect::<Vec<_>>(), vec!["main.py"]);
    assert_eq!(
        generated.files["main.py"],
        "import sys\nprint(sys.argv[1][::-1])\n"
    );
    assert_eq!(generated.memory["file_list"], "main.py");

    let clarified = state.stage(Stage::Clarified).unwrap();
    assert!(clarified.files["spec.md"].starts_with("Reverse the first argument"));
    assert_eq!(clarified.memory["clarification_rounds"], "1");

    // Files are laid out under the workspace
    assert!(project.root.join("workspace/generated/files/main.py").exists());
    assert!(project.root.join("workspace/raw/files/prompt").exists());
}

#[tokio::test]
async fn test_generate_sees_clarified_spec() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    let model = ScriptedModel::new(&[SPEC_REPLY, MAIN_PY_REPLY]);

    project
        .runner(PipelineMode::Clarify, model.clone(), ScriptedHuman::new(&[]))
        .run()
        .await
        .unwrap();

    let seen = model.seen();
    let generate_request = &seen[1].messages[1].content;
    assert!(generate_request.contains("spec.md"));
    assert!(generate_request.contains("No unicode handling."));
}

#[tokio::test]
async fn test_clarify_limit_forces_spec() {
    let project = TestProject::new("Something vague.").await;
    let model = ScriptedModel::new(&[
        "Question one?",
        "Question two?",
        "Question three?",
        "Question four?",
        SPEC_REPLY,
        MAIN_PY_REPLY,
    ]);
    // No answers: every question is met with an instruction to assume
    let human = ScriptedHuman::new(&[]);

    project
        .runner(PipelineMode::Clarify, model.clone(), human.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(human.questions().len(), 3);
    let clarify_request = model.seen()[4].clone();
    let last_user = clarify_request.messages.last().unwrap();
    assert_eq!(last_user.role, Role::User);
    assert!(last_user.content.contains("spec.md"));
}

#[tokio::test]
async fn test_full_mode_adds_entrypoint() {
    let project = TestProject::new("A CLI tool that reverses a string.").await;
    project
        .run(
            PipelineMode::Full,
            &[SPEC_REPLY, MAIN_PY_REPLY, RUN_SH_REPLY],
        )
        .await
        .unwrap();

    let state = project.load().await;
    let final_stage = state.stage(Stage::Final).unwrap();
    assert_eq!(
        final_stage.files.keys().collect::<Vec<_>>(),
        vec!["main.py", "run.sh"]
    );
    assert_eq!(final_stage.memory["entrypoint"], "run.sh");
    // Generated is not touched by the entrypoint step
    assert_eq!(
        state.stage(Stage::Generated).unwrap().files.keys().collect::<Vec<_>>(),
        vec!["main.py"]
    );
}
