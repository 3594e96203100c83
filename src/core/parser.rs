//! File-block reply parser
//!
//! Model replies carry files as a filename line followed by a fenced block:
//!
//! ````text
//! src/main.py
//! ```python
//! print("hello")
//! ```
//! ````
//!
//! The filename may be wrapped in backticks or `**` and may end with `:`. A
//! bare filename needs a `.` or `/`, so a label like `Usage:` stays prose.
//! Prose between blocks is ignored, as are fenced blocks with no filename
//! line directly above them. A reply with no file block at all, an
//! unterminated fence, an unsafe path or a repeated filename is malformed.

use crate::core::error::{PipelineError, Result};
use crate::core::project::FilesDict;
use regex::Regex;
use std::sync::OnceLock;

const FENCE_CLOSE: &str = "```";

fn fence_open() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"^```[\w+#.\-]*\s*$").expect("valid fence regex"))
}

fn path_token() -> &'static Regex {
    static PATH: OnceLock<Regex> = OnceLock::new();
    PATH.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-/]+$").expect("valid path regex"))
}

/// Parse every file block in `reply`
pub fn parse_files(reply: &str) -> Result<FilesDict> {
    let lines: Vec<&str> = reply.lines().collect();
    let mut files = FilesDict::new();
    let mut i = 0;

    while i < lines.len() {
        if !fence_open().is_match(lines[i].trim_end()) {
            i += 1;
            continue;
        }

        let close = lines[i + 1..]
            .iter()
            .position(|line| line.trim_end() == FENCE_CLOSE)
            .map(|offset| i + 1 + offset)
            .ok_or_else(|| {
                PipelineError::MalformedResponse(format!(
                    "unterminated code fence starting at line {}",
                    i + 1
                ))
            })?;

        let header = if i > 0 { parse_header(lines[i - 1]) } else { None };
        if let Some(name) = header {
            validate_path(&name)?;
            if files.contains_key(&name) {
                return Err(PipelineError::MalformedResponse(format!(
                    "file '{}' appears more than once",
                    name
                )));
            }
            let body = &lines[i + 1..close];
            let content = if body.is_empty() {
                String::new()
            } else {
                let mut joined = body.join("\n");
                joined.push('\n');
                joined
            };
            files.insert(name, content);
        }

        i = close + 1;
    }

    if files.is_empty() {
        return Err(PipelineError::MalformedResponse(
            "reply contains no file blocks".to_string(),
        ));
    }
    Ok(files)
}

/// Render files in the same block format the parser accepts
pub fn render_files(files: &FilesDict) -> String {
    let mut out = String::new();
    for (name, content) in files {
        out.push_str(name);
        out.push('\n');
        out.push_str(FENCE_CLOSE);
        out.push('\n');
        out.push_str(content);
        if !content.is_empty() && !content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(FENCE_CLOSE);
        out.push_str("\n\n");
    }
    out
}

/// A bare header must look like a path (contain `.` or `/`); a name wrapped
/// in backticks or `**` may be anything path-shaped, such as `Makefile`.
fn parse_header(line: &str) -> Option<String> {
    let mut name = line.trim();
    let mut wrapped = false;
    name = name.strip_suffix(':').unwrap_or(name).trim_end();
    if let Some(inner) = name.strip_prefix("**").and_then(|n| n.strip_suffix("**")) {
        name = inner;
        wrapped = true;
    }
    if let Some(inner) = name.strip_prefix('`').and_then(|n| n.strip_suffix('`')) {
        name = inner;
        wrapped = true;
    }
    name = name.strip_suffix(':').unwrap_or(name);

    if !path_token().is_match(name) {
        return None;
    }
    if !wrapped && !name.contains(['.', '/']) {
        return None;
    }
    Some(name.to_string())
}

/// Reject empty, `.` and `..` path components
pub fn validate_path(name: &str) -> Result<()> {
    let unsafe_component = name
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..");
    if unsafe_component {
        return Err(PipelineError::MalformedResponse(format!(
            "unsafe file path '{}'",
            name
        )));
    }
    Ok(())
}
