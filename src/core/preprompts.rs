//! System prompts for each step
//!
//! Built-in texts can be overridden per project: with custom preprompts
//! enabled, missing files are copied into `<project>/preprompts/` and every
//! prompt is then read from there.

use crate::core::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const PREPROMPTS_DIR: &str = "preprompts";

const FILE_FORMAT: &str = "\
You will output the content of each file, including all code. Each file must \
strictly follow this format, where FILENAME is the lowercase relative path \
of the file and LANG is the markup code block language:

FILENAME
```LANG
CODE
```

Do not put anything else on the FILENAME line.";

const CLARIFY: &str = "\
Given some instructions, determine if anything needs to be clarified. Do not \
carry them out. If something is unclear, ask exactly one clarifying question \
and nothing else. When nothing remains unclear, write the complete, clarified \
specification as a single file named spec.md.";

const GENERATE: &str = "\
You will get a specification and must write the full implementation. Think \
step by step: first lay out the core classes, functions and methods, then \
write every file. Include a dependency definition file appropriate for the \
language. Make sure the code is complete and runnable; do not leave \
placeholders.";

const ENTRYPOINT: &str = "\
You will get information about a codebase that is currently on disk in the \
current folder. From this, answer with the commands needed to a) install \
dependencies and b) run all necessary parts of the codebase, in parallel if \
necessary. Put them in a single file named run.sh. Do not use placeholders.";

/// Loaded prompt texts keyed by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprompts {
    texts: BTreeMap<String, String>,
}

impl Default for Preprompts {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Preprompts {
    /// Names of every preprompt
    pub const NAMES: [&'static str; 4] = ["clarify", "entrypoint", "file_format", "generate"];

    pub fn builtin() -> Self {
        let texts = Self::NAMES
            .iter()
            .map(|name| (name.to_string(), builtin_text(name).to_string()))
            .collect();
        Self { texts }
    }

    /// Load preprompts for a project
    pub async fn load(project_root: &Path, use_custom: bool) -> Result<Self> {
        if !use_custom {
            return Ok(Self::builtin());
        }

        let dir = project_root.join(PREPROMPTS_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::io(&dir, e))?;

        let mut texts = BTreeMap::new();
        for name in Self::NAMES {
            let path = dir.join(name);
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Copying default preprompt {} to {}", name, path.display());
                    let text = builtin_text(name).to_string();
                    tokio::fs::write(&path, &text)
                        .await
                        .map_err(|e| PipelineError::io(&path, e))?;
                    text
                }
                Err(e) => return Err(PipelineError::io(&path, e)),
            };
            texts.insert(name.to_string(), text);
        }
        Ok(Self { texts })
    }

    pub fn get(&self, name: &str) -> &str {
        self.texts.get(name).map(String::as_str).unwrap_or("")
    }

    /// System message for a step that answers in file blocks
    pub fn system_for(&self, step: &str) -> String {
        format!("{}\n\n{}", self.get(step).trim_end(), self.get("file_format").trim_end())
    }
}

fn builtin_text(name: &str) -> &'static str {
    match name {
        "clarify" => CLARIFY,
        "entrypoint" => ENTRYPOINT,
        "file_format" => FILE_FORMAT,
        "generate" => GENERATE,
        _ => "",
    }
}
