//! Read-only git tools, run as bounded subprocesses.
//!
//! Every invocation is `git -C <root> ...` against the workspace root with
//! a hard timeout. A failing git command (bad rev, not a repo) is reported
//! inside the JSON envelope; only a missing `git` binary or a timeout fail
//! the call itself.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use toolgate_core::{JsonMap, Tool, ToolError, ToolRegistry};
use tracing::debug;

use crate::args::{optional_bool, optional_str, optional_u64, required_str, truncate_utf8};

const OUTPUT_CAP_BYTES: u64 = 20_000;
const QUICK_TIMEOUT_SECS: u64 = 5;
const SLOW_TIMEOUT_SECS: u64 = 8;

/// Build the `git` domain registry, rooted at the workspace.
pub fn git_domain(root: PathBuf) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(StatusTool { root: root.clone() }));
    registry.register(Box::new(DiffTool { root: root.clone() }));
    registry.register(Box::new(LogTool { root: root.clone() }));
    registry.register(Box::new(ShowTool { root: root.clone() }));
    registry.register(Box::new(BranchListTool { root: root.clone() }));
    registry.register(Box::new(CurrentBranchTool { root }));
    registry
}

async fn run_git(
    root: &Path,
    args: &[&str],
    timeout_secs: u64,
    tool: &str,
) -> Result<Output, ToolError> {
    debug!(tool, ?args, "Running git");
    let future = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output();
    match tokio::time::timeout(Duration::from_secs(timeout_secs), future).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(ToolError::Execution {
            name: tool.to_string(),
            reason: format!("failed to run git: {e}"),
        }),
        Err(_) => Err(ToolError::Timeout {
            name: tool.to_string(),
            timeout_secs,
        }),
    }
}

fn git_error_envelope(output: &Output, fallback: &str) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = stderr.trim();
    json!({
        "status": "error",
        "message": if message.is_empty() { fallback } else { message },
    })
    .to_string()
}

struct StatusTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for StatusTool {
    fn name(&self) -> &str {
        "git.status"
    }
    fn description(&self) -> &str {
        "Show the repository status as parsed porcelain entries."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }
    async fn execute(&self, _arguments: &JsonMap) -> Result<String, ToolError> {
        let output = run_git(
            &self.root,
            &["status", "--porcelain=v1"],
            QUICK_TIMEOUT_SECS,
            self.name(),
        )
        .await?;
        if !output.status.success() {
            return Ok(git_error_envelope(&output, "git status failed"));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        // porcelain v1: two status columns, a space, then the path
        let entries: Vec<serde_json::Value> = stdout
            .lines()
            .filter(|line| line.len() > 3)
            .map(|line| {
                json!({
                    "status": line[..2].trim(),
                    "path": &line[3..],
                })
            })
            .collect();
        Ok(json!({
            "status": "ok",
            "clean": entries.is_empty(),
            "entries": entries,
        })
        .to_string())
    }
}

struct DiffTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for DiffTool {
    fn name(&self) -> &str {
        "git.diff"
    }
    fn description(&self) -> &str {
        "Show a unified diff, optionally for one path, optionally staged."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Limit the diff to this path" },
                "staged": { "type": "boolean", "description": "Diff the index instead of the worktree" },
                "unified": { "type": "integer", "description": "Context lines (default 2)" },
                "max_bytes": { "type": "integer", "description": "Output cap in bytes (default 20000)" }
            },
            "additionalProperties": false
        })
    }
    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = optional_str(arguments, "path");
        let staged = optional_bool(arguments, "staged", false);
        let unified = optional_u64(arguments, "unified", 2);
        let max_bytes = optional_u64(arguments, "max_bytes", OUTPUT_CAP_BYTES) as usize;

        let unified_flag = format!("--unified={unified}");
        let mut args = vec!["diff", unified_flag.as_str()];
        if staged {
            args.push("--staged");
        }
        if let Some(path) = path {
            args.push("--");
            args.push(path);
        }
        let output = run_git(&self.root, &args, SLOW_TIMEOUT_SECS, self.name()).await?;
        if !output.status.success() {
            return Ok(git_error_envelope(&output, "git diff failed"));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let (diff, truncated) = truncate_utf8(&stdout, max_bytes);
        Ok(json!({
            "status": "ok",
            "path": path,
            "staged": staged,
            "diff": diff,
            "truncated": truncated,
        })
        .to_string())
    }
}

struct LogTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for LogTool {
    fn name(&self) -> &str {
        "git.log"
    }
    fn description(&self) -> &str {
        "Show recent commits, one per line (hash, date, subject)."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "max_count": { "type": "integer", "description": "How many commits (default 20)" },
                "path": { "type": "string", "description": "Limit history to this path" }
            },
            "additionalProperties": false
        })
    }
    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let max_count = optional_u64(arguments, "max_count", 20);
        let count_flag = format!("-n{max_count}");
        let mut args = vec![
            "log",
            count_flag.as_str(),
            "--pretty=%h %ad %s",
            "--date=short",
        ];
        if let Some(path) = optional_str(arguments, "path") {
            args.push("--");
            args.push(path);
        }
        let output = run_git(&self.root, &args, QUICK_TIMEOUT_SECS, self.name()).await?;
        if !output.status.success() {
            return Ok(git_error_envelope(&output, "git log failed"));
        }
        let commits: Vec<&str> = std::str::from_utf8(&output.stdout)
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        Ok(json!({ "status": "ok", "commits": commits }).to_string())
    }
}

struct ShowTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for ShowTool {
    fn name(&self) -> &str {
        "git.show"
    }
    fn description(&self) -> &str {
        "Show a commit or object by revision."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "rev": { "type": "string", "description": "Revision, e.g. HEAD or abc123" },
                "path": { "type": "string", "description": "Limit output to this path" },
                "max_bytes": { "type": "integer", "description": "Output cap in bytes (default 20000)" }
            },
            "required": ["rev"],
            "additionalProperties": false
        })
    }
    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let rev = required_str(arguments, "rev", self.name())?;
        let max_bytes = optional_u64(arguments, "max_bytes", OUTPUT_CAP_BYTES) as usize;
        let mut args = vec!["show", rev];
        if let Some(path) = optional_str(arguments, "path") {
            args.push("--");
            args.push(path);
        }
        let output = run_git(&self.root, &args, SLOW_TIMEOUT_SECS, self.name()).await?;
        if !output.status.success() {
            return Ok(git_error_envelope(&output, "git show failed"));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let (show, truncated) = truncate_utf8(&stdout, max_bytes);
        Ok(json!({
            "status": "ok",
            "rev": rev,
            "show": show,
            "truncated": truncated,
        })
        .to_string())
    }
}

struct BranchListTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for BranchListTool {
    fn name(&self) -> &str {
        "git.branch_list"
    }
    fn description(&self) -> &str {
        "List local branches by short name."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }
    async fn execute(&self, _arguments: &JsonMap) -> Result<String, ToolError> {
        let output = run_git(
            &self.root,
            &["branch", "--format=%(refname:short)"],
            QUICK_TIMEOUT_SECS,
            self.name(),
        )
        .await?;
        if !output.status.success() {
            return Ok(git_error_envelope(&output, "git branch failed"));
        }
        let branches: Vec<&str> = std::str::from_utf8(&output.stdout)
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        Ok(json!({ "status": "ok", "branches": branches }).to_string())
    }
}

struct CurrentBranchTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for CurrentBranchTool {
    fn name(&self) -> &str {
        "git.current_branch"
    }
    fn description(&self) -> &str {
        "Show the currently checked-out branch."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }
    async fn execute(&self, _arguments: &JsonMap) -> Result<String, ToolError> {
        let output = run_git(
            &self.root,
            &["rev-parse", "--abbrev-ref", "HEAD"],
            QUICK_TIMEOUT_SECS,
            self.name(),
        )
        .await?;
        if !output.status.success() {
            return Ok(git_error_envelope(&output, "git rev-parse failed"));
        }
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(json!({ "status": "ok", "branch": branch }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_core::ToolHandler;

    fn init_repo(dir: &std::path::Path) {
        let run = |args: &[&str]| {
            std::process::Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(args)
                .env("GIT_AUTHOR_NAME", "test")
                .env("GIT_AUTHOR_EMAIL", "test@example.com")
                .env("GIT_COMMITTER_NAME", "test")
                .env("GIT_COMMITTER_EMAIL", "test@example.com")
                .output()
                .unwrap()
        };
        run(&["init", "-q", "-b", "main"]);
        std::fs::write(dir.join("a.txt"), "one\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
    }

    #[test]
    fn manifest_lists_all_git_tools() {
        let registry = git_domain(PathBuf::from("."));
        let names: Vec<String> = registry
            .available_tools()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "git.status",
                "git.diff",
                "git.log",
                "git.show",
                "git.branch_list",
                "git.current_branch"
            ]
        );
    }

    #[tokio::test]
    async fn status_reports_clean_and_dirty() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let registry = git_domain(dir.path().to_path_buf());

        let out = registry.dispatch("git.status", &JsonMap::new()).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["clean"], true);

        std::fs::write(dir.path().join("b.txt"), "new\n").unwrap();
        let out = registry.dispatch("git.status", &JsonMap::new()).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["clean"], false);
        assert_eq!(v["entries"][0]["status"], "??");
        assert_eq!(v["entries"][0]["path"], "b.txt");
    }

    #[tokio::test]
    async fn log_and_current_branch() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let registry = git_domain(dir.path().to_path_buf());

        let out = registry.dispatch("git.log", &JsonMap::new()).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["commits"].as_array().unwrap().len(), 1);
        assert!(v["commits"][0].as_str().unwrap().contains("initial"));

        let out = registry
            .dispatch("git.current_branch", &JsonMap::new())
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["branch"], "main");
    }

    #[tokio::test]
    async fn diff_of_unstaged_change() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();
        let registry = git_domain(dir.path().to_path_buf());

        let mut args = JsonMap::new();
        args.insert("path".into(), serde_json::json!("a.txt"));
        let out = registry.dispatch("git.diff", &args).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], "ok");
        assert!(v["diff"].as_str().unwrap().contains("+two"));
        assert_eq!(v["truncated"], false);
    }

    #[tokio::test]
    async fn show_requires_rev() {
        let registry = git_domain(PathBuf::from("."));
        let err = registry
            .dispatch("git.show", &JsonMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn bad_rev_is_an_error_envelope_not_a_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let registry = git_domain(dir.path().to_path_buf());

        let mut args = JsonMap::new();
        args.insert("rev".into(), serde_json::json!("no-such-rev"));
        let out = registry.dispatch("git.show", &args).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], "error");
    }

    #[tokio::test]
    async fn non_repo_directory_reports_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let registry = git_domain(dir.path().to_path_buf());
        let out = registry.dispatch("git.status", &JsonMap::new()).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], "error");
    }
}
