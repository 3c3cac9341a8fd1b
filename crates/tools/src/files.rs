//! File tools rooted in the workspace.
//!
//! Every path argument is resolved and confined by the workspace guard.
//! Runtime I/O failures are reported inside the JSON result envelope
//! (`{"status":"error", ...}`) so the model can see and react to them;
//! only guard violations and missing required arguments fail the call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncReadExt;
use toolgate_core::{JsonMap, Tool, ToolError, ToolRegistry};
use toolgate_security::WorkspaceGuard;
use tracing::debug;

use crate::args::{optional_bool, optional_str, optional_u64, required_str};

const READ_CAP_BYTES: u64 = 100 * 1024;
const SEARCH_RESULT_CAP: usize = 500;

/// Build the `files` domain registry.
pub fn files_domain(guard: Arc<WorkspaceGuard>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ListTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(SearchTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(ReadTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(WriteTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(HeadTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(TailTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(MkdirTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(AppendTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(DeleteTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(CopyTool {
        guard: guard.clone(),
    }));
    registry.register(Box::new(MoveTool { guard }));
    registry
}

fn resolve(guard: &WorkspaceGuard, raw: &str, tool: &str) -> Result<PathBuf, ToolError> {
    guard.resolve(raw).map_err(|e| ToolError::Execution {
        name: tool.to_string(),
        reason: e.to_string(),
    })
}

fn resolve_or_root(
    guard: &WorkspaceGuard,
    raw: Option<&str>,
    tool: &str,
) -> Result<PathBuf, ToolError> {
    guard.resolve_or_root(raw).map_err(|e| ToolError::Execution {
        name: tool.to_string(),
        reason: e.to_string(),
    })
}

/// The details payload used by `files.list` and `files.search` entries.
fn file_details(path: &Path, size: u64) -> serde_json::Value {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let directory = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    json!({
        "path": path.display().to_string(),
        "name": name,
        "size": size,
        "type": extension_type(path),
        "directory": directory,
    })
}

fn extension_type(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "no_extension".to_string())
}

fn error_envelope(path: &Path, message: impl std::fmt::Display) -> String {
    json!({
        "status": "error",
        "message": message.to_string(),
        "path": path.display().to_string(),
    })
    .to_string()
}

fn pair_error_envelope(src: &Path, dst: &Path, message: impl std::fmt::Display) -> String {
    json!({
        "status": "error",
        "message": message.to_string(),
        "src": src.display().to_string(),
        "dst": dst.display().to_string(),
    })
    .to_string()
}

/// Match `text` against a glob-style pattern supporting `*` and `?`.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

async fn require_directory(directory: &Path) -> Result<(), String> {
    match tokio::fs::metadata(directory).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(format!("Path is not a directory: {}", directory.display())),
        Err(_) => Err(format!("Directory does not exist: {}", directory.display())),
    }
}

fn sort_by_name(entries: &mut [serde_json::Value]) {
    entries.sort_by(|a, b| {
        a["name"]
            .as_str()
            .unwrap_or("")
            .cmp(b["name"].as_str().unwrap_or(""))
    });
}

// --- files.list ---

struct ListTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        "files.list"
    }

    fn description(&self) -> &str {
        "List the files in a directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory to list (default: workspace root)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let directory = resolve_or_root(&self.guard, optional_str(arguments, "directory"), "files.list")?;
        debug!(directory = %directory.display(), "Executing files.list");

        require_directory(&directory)
            .await
            .map_err(|reason| ToolError::Execution {
                name: "files.list".into(),
                reason,
            })?;

        let mut reader =
            tokio::fs::read_dir(&directory)
                .await
                .map_err(|e| ToolError::Execution {
                    name: "files.list".into(),
                    reason: e.to_string(),
                })?;

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = reader.next_entry().await.as_ref().map(Option::as_ref) {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_file() {
                entries.push(file_details(&entry.path(), meta.len()));
            }
        }
        sort_by_name(&mut entries);
        Ok(serde_json::Value::Array(entries).to_string())
    }
}

// --- files.search ---

struct SearchTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "files.search"
    }

    fn description(&self) -> &str {
        "Search a directory recursively for files matching a glob-style pattern (* and ?)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory to search (default: workspace root)"
                },
                "pattern": {
                    "type": "string",
                    "description": "Pattern matched against file names, e.g. *.rs; with a '/' it matches the path relative to the directory"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let pattern = required_str(arguments, "pattern", "files.search")?;
        let directory =
            resolve_or_root(&self.guard, optional_str(arguments, "directory"), "files.search")?;
        debug!(directory = %directory.display(), pattern = %pattern, "Executing files.search");

        require_directory(&directory)
            .await
            .map_err(|reason| ToolError::Execution {
                name: "files.search".into(),
                reason,
            })?;

        let mut entries = Vec::new();
        let mut stack = vec![directory.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(mut reader) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = reader.next_entry().await.as_ref().map(Option::as_ref) {
                let path = entry.path();
                let Ok(meta) = entry.metadata().await else {
                    continue;
                };
                if meta.is_dir() {
                    stack.push(path);
                    continue;
                }
                if !meta.is_file() {
                    continue;
                }
                let target = if pattern.contains('/') {
                    path.strip_prefix(&directory)
                        .unwrap_or(&path)
                        .display()
                        .to_string()
                } else {
                    entry.file_name().to_string_lossy().into_owned()
                };
                if wildcard_match(pattern, &target) {
                    entries.push(file_details(&path, meta.len()));
                }
            }
        }

        sort_by_name(&mut entries);
        entries.truncate(SEARCH_RESULT_CAP);
        Ok(serde_json::Value::Array(entries).to_string())
    }
}

// --- files.read ---

struct ReadTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "files.read"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file. Files over the size cap are refused."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to read"},
                "max_bytes": {
                    "type": "integer",
                    "description": "Size cap in bytes (default 102400)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = resolve(
            &self.guard,
            required_str(arguments, "path", "files.read")?,
            "files.read",
        )?;
        let cap = optional_u64(arguments, "max_bytes", READ_CAP_BYTES);
        debug!(path = %path.display(), "Executing files.read");

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => return Ok(error_envelope(&path, e)),
        };
        if !meta.is_file() {
            return Ok(error_envelope(
                &path,
                format!("Path is not a file: {}", path.display()),
            ));
        }
        if meta.len() > cap {
            return Ok(json!({
                "status": "too_large",
                "message": "File exceeds size cap",
                "size": meta.len(),
                "path": path.display().to_string(),
            })
            .to_string());
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(error_envelope(&path, e)),
        };
        match String::from_utf8(bytes) {
            Ok(content) => Ok(json!({
                "status": "ok",
                "path": path.display().to_string(),
                "content": content,
            })
            .to_string()),
            Err(_) => Ok(json!({
                "status": "binary_or_non_utf8",
                "message": "File is not valid UTF-8 text",
                "path": path.display().to_string(),
            })
            .to_string()),
        }
    }
}

// --- files.write ---

struct WriteTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "files.write"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories as needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to write"},
                "content": {"type": "string", "description": "Text content"},
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace an existing file (default: true)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = resolve(
            &self.guard,
            required_str(arguments, "path", "files.write")?,
            "files.write",
        )?;
        let content = optional_str(arguments, "content").unwrap_or_default();
        let overwrite = optional_bool(arguments, "overwrite", true);
        debug!(path = %path.display(), overwrite, "Executing files.write");

        if !overwrite && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(error_envelope(
                &path,
                "File already exists and overwrite is false",
            ));
        }
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(error_envelope(&path, e));
            }
        }
        if let Err(e) = tokio::fs::write(&path, content).await {
            return Ok(error_envelope(&path, e));
        }
        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        Ok(json!({
            "status": "ok",
            "path": path.display().to_string(),
            "type": extension_type(&path),
            "size": size,
        })
        .to_string())
    }
}

// --- files.head ---

struct HeadTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for HeadTool {
    fn name(&self) -> &str {
        "files.head"
    }

    fn description(&self) -> &str {
        "Read the first lines (or bytes) of a file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "lines": {"type": "integer", "description": "Line count (default 20)"},
                "bytes": {
                    "type": "integer",
                    "description": "If set, read this many bytes instead of lines"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = resolve(
            &self.guard,
            required_str(arguments, "path", "files.head")?,
            "files.head",
        )?;
        let lines = optional_u64(arguments, "lines", 20).max(1);
        let n_bytes = arguments.get("bytes").and_then(|v| v.as_u64()).unwrap_or(0);

        let content = if n_bytes > 0 {
            let file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => return Ok(error_envelope(&path, e)),
            };
            let mut buf = Vec::new();
            if let Err(e) = file.take(n_bytes).read_to_end(&mut buf).await {
                return Ok(error_envelope(&path, e));
            }
            String::from_utf8_lossy(&buf).into_owned()
        } else {
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => return Ok(error_envelope(&path, e)),
            };
            text.split_inclusive('\n').take(lines as usize).collect()
        };

        Ok(json!({
            "status": "ok",
            "path": path.display().to_string(),
            "content": content,
        })
        .to_string())
    }
}

// --- files.tail ---

struct TailTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for TailTool {
    fn name(&self) -> &str {
        "files.tail"
    }

    fn description(&self) -> &str {
        "Read the last lines of a file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "lines": {"type": "integer", "description": "Line count (default 20)"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = resolve(
            &self.guard,
            required_str(arguments, "path", "files.tail")?,
            "files.tail",
        )?;
        let lines = optional_u64(arguments, "lines", 20).max(1) as usize;

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => return Ok(error_envelope(&path, e)),
        };
        let segments: Vec<&str> = text.split_inclusive('\n').collect();
        let start = segments.len().saturating_sub(lines);
        let content: String = segments[start..].concat();

        Ok(json!({
            "status": "ok",
            "path": path.display().to_string(),
            "content": content,
        })
        .to_string())
    }
}

// --- files.mkdir ---

struct MkdirTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for MkdirTool {
    fn name(&self) -> &str {
        "files.mkdir"
    }

    fn description(&self) -> &str {
        "Create a directory (and any missing parents)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "exist_ok": {
                    "type": "boolean",
                    "description": "Succeed if the directory already exists (default: true)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = resolve(
            &self.guard,
            required_str(arguments, "path", "files.mkdir")?,
            "files.mkdir",
        )?;
        let exist_ok = optional_bool(arguments, "exist_ok", true);
        debug!(path = %path.display(), exist_ok, "Executing files.mkdir");

        if !exist_ok && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(error_envelope(
                &path,
                format!("Directory already exists: {}", path.display()),
            ));
        }
        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            return Ok(error_envelope(&path, e));
        }
        Ok(json!({
            "status": "ok",
            "path": path.display().to_string(),
            "type": "dir",
        })
        .to_string())
    }
}

// --- files.append ---

struct AppendTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for AppendTool {
    fn name(&self) -> &str {
        "files.append"
    }

    fn description(&self) -> &str {
        "Append text to a file, creating it if missing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = resolve(
            &self.guard,
            required_str(arguments, "path", "files.append")?,
            "files.append",
        )?;
        let content = optional_str(arguments, "content").unwrap_or_default();

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(error_envelope(&path, e));
            }
        }
        let result = async {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = result {
            return Ok(error_envelope(&path, e));
        }
        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        Ok(json!({
            "status": "ok",
            "path": path.display().to_string(),
            "size": size,
        })
        .to_string())
    }
}

// --- files.delete ---

struct DeleteTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for DeleteTool {
    fn name(&self) -> &str {
        "files.delete"
    }

    fn description(&self) -> &str {
        "Delete a file, or a directory with recursive=true."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "recursive": {
                    "type": "boolean",
                    "description": "Delete a non-empty directory (default: false)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let path = resolve(
            &self.guard,
            required_str(arguments, "path", "files.delete")?,
            "files.delete",
        )?;
        let recursive = optional_bool(arguments, "recursive", false);
        debug!(path = %path.display(), recursive, "Executing files.delete");

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => return Ok(error_envelope(&path, e)),
        };
        let result = if meta.is_dir() && recursive {
            tokio::fs::remove_dir_all(&path).await
        } else if meta.is_dir() {
            tokio::fs::remove_dir(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        if let Err(e) = result {
            return Ok(error_envelope(&path, e));
        }
        Ok(json!({
            "status": "ok",
            "path": path.display().to_string(),
        })
        .to_string())
    }
}

// --- files.copy ---

struct CopyTool {
    guard: Arc<WorkspaceGuard>,
}

async fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((from, to)) = stack.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut reader = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = reader.next_entry().await? {
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), target).await?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Tool for CopyTool {
    fn name(&self) -> &str {
        "files.copy"
    }

    fn description(&self) -> &str {
        "Copy a file or directory tree."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "src": {"type": "string"},
                "dst": {"type": "string"}
            },
            "required": ["src", "dst"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let src = resolve(
            &self.guard,
            required_str(arguments, "src", "files.copy")?,
            "files.copy",
        )?;
        let dst = resolve(
            &self.guard,
            required_str(arguments, "dst", "files.copy")?,
            "files.copy",
        )?;
        debug!(src = %src.display(), dst = %dst.display(), "Executing files.copy");

        if let Some(parent) = dst.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(pair_error_envelope(&src, &dst, e));
            }
        }
        let result = match tokio::fs::metadata(&src).await {
            Ok(meta) if meta.is_dir() => copy_tree(&src, &dst).await,
            Ok(_) => tokio::fs::copy(&src, &dst).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            return Ok(pair_error_envelope(&src, &dst, e));
        }
        Ok(json!({
            "status": "ok",
            "src": src.display().to_string(),
            "dst": dst.display().to_string(),
        })
        .to_string())
    }
}

// --- files.move ---

struct MoveTool {
    guard: Arc<WorkspaceGuard>,
}

#[async_trait]
impl Tool for MoveTool {
    fn name(&self) -> &str {
        "files.move"
    }

    fn description(&self) -> &str {
        "Move or rename a file or directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "src": {"type": "string"},
                "dst": {"type": "string"}
            },
            "required": ["src", "dst"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let src = resolve(
            &self.guard,
            required_str(arguments, "src", "files.move")?,
            "files.move",
        )?;
        let dst = resolve(
            &self.guard,
            required_str(arguments, "dst", "files.move")?,
            "files.move",
        )?;
        debug!(src = %src.display(), dst = %dst.display(), "Executing files.move");

        if let Some(parent) = dst.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(pair_error_envelope(&src, &dst, e));
            }
        }
        if let Err(e) = tokio::fs::rename(&src, &dst).await {
            return Ok(pair_error_envelope(&src, &dst, e));
        }
        Ok(json!({
            "status": "ok",
            "src": src.display().to_string(),
            "dst": dst.display().to_string(),
        })
        .to_string())
    }
}
