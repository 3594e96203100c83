//! Test utility functions for pipeline scenarios

use async_trait::async_trait;
use codegen_pipeline::agent::{HumanInput, ModelError, ModelExecutor, ModelReply, TokenUsage};
use codegen_pipeline::core::{Conversation, Pipeline, PipelineMode, Project, Result};
use codegen_pipeline::execution::{PipelineRunner, RerunTool, RunReport};
use codegen_pipeline::persistence::{FsLogStore, FsStateStore, StateStore};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Mock model that returns predefined replies in order
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Conversation>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Number of `send` calls, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Conversations the model was asked to continue
    pub fn seen(&self) -> Vec<Conversation> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelExecutor for ScriptedModel {
    async fn send(&self, conversation: &Conversation) -> std::result::Result<ModelReply, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(conversation.clone());

        match self.replies.lock().unwrap().pop_front() {
            Some(content) => Ok(ModelReply {
                content,
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
            }),
            None => Err(ModelError::Api("service unavailable".to_string())),
        }
    }
}

/// Mock human that answers from a queue and records the questions
#[derive(Default)]
pub struct ScriptedHuman {
    answers: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedHuman {
    pub fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            questions: Mutex::new(Vec::new()),
        })
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl HumanInput for ScriptedHuman {
    async fn answer(&self, question: &str) -> Option<String> {
        self.questions.lock().unwrap().push(question.to_string());
        self.answers.lock().unwrap().pop_front()
    }
}

/// A project directory on disk with the filesystem stores
pub struct TestProject {
    _dir: TempDir,
    pub root: PathBuf,
    pub state: Arc<FsStateStore>,
    pub logs: Arc<FsLogStore>,
}

impl TestProject {
    pub async fn new(spec: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let state = Arc::new(FsStateStore::new(&root));
        state.write_main_spec(spec).await.unwrap();
        Self {
            logs: Arc::new(FsLogStore::new(&root)),
            _dir: dir,
            root,
            state,
        }
    }

    pub fn runner(
        &self,
        mode: PipelineMode,
        model: Arc<ScriptedModel>,
        human: Arc<ScriptedHuman>,
    ) -> PipelineRunner {
        PipelineRunner::new(
            Pipeline::for_mode(mode),
            self.state.clone(),
            self.logs.clone(),
            model,
            human,
        )
        .with_max_clarify_rounds(3)
    }

    pub async fn run(&self, mode: PipelineMode, replies: &[&str]) -> Result<RunReport> {
        self.runner(mode, ScriptedModel::new(replies), ScriptedHuman::new(&[]))
            .run()
            .await
    }

    pub fn rerun_tool(&self, mode: PipelineMode) -> RerunTool {
        RerunTool::new(
            Pipeline::for_mode(mode),
            self.state.clone(),
            self.logs.clone(),
        )
    }

    pub async fn load(&self) -> Project {
        self.state.load().await.unwrap()
    }

    pub fn log_file(&self, step: &str, index: u32) -> PathBuf {
        self.logs.log_path(step, index)
    }

    /// Every file under the project, keyed by relative path
    pub fn tree(&self) -> BTreeMap<String, Vec<u8>> {
        read_tree(&self.root)
    }
}

fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                out.insert(relative, std::fs::read(&path).unwrap());
            }
        }
    }
    out
}

pub const MAIN_PY_REPLY: &str = "Here is the program.\n\nmain.py\n```python\nimport sys\nprint(sys.argv[1][::-1])\n```\n";

pub const SPEC_REPLY: &str = "Thanks, that settles it.\n\nspec.md\n```markdown\nReverse the first argument and print it. No unicode handling.\n```\n";

pub const RUN_SH_REPLY: &str = "run.sh\n```sh\npython main.py \"$@\"\n```\n";
