//! System tools: host introspection and allowlisted command execution.
//!
//! `system.exec` takes an argv array and refuses anything whose program is
//! not in the configured allowlist. Commands run without a shell, in the
//! workspace root, with a bounded timeout and a byte cap on captured
//! output.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use toolgate_core::{JsonMap, Tool, ToolError, ToolRegistry};
use tracing::{debug, warn};

use crate::args::{optional_u64, truncate_utf8};

const OUTPUT_CAP_BYTES: u64 = 20_000;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 30;

/// Build the `system` domain registry.
pub fn system_domain(root: PathBuf, exec_allowlist: Vec<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(OsInfoTool { root: root.clone() }));
    registry.register(Box::new(ExecTool {
        root,
        allowlist: exec_allowlist,
    }));
    registry
}

struct OsInfoTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for OsInfoTool {
    fn name(&self) -> &str {
        "system.os_info"
    }
    fn description(&self) -> &str {
        "Get basic information about the host: OS, architecture, hostname, workspace directory."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }
    async fn execute(&self, _arguments: &JsonMap) -> Result<String, ToolError> {
        let hostname = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty());
        Ok(json!({
            "status": "ok",
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "family": std::env::consts::FAMILY,
            "hostname": hostname,
            "workspace": self.root.display().to_string(),
        })
        .to_string())
    }
}

struct ExecTool {
    root: PathBuf,
    allowlist: Vec<String>,
}

impl ExecTool {
    fn is_allowed(&self, program: &str) -> bool {
        // match on the basename so "/bin/ls" counts as "ls"
        let base = std::path::Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        self.allowlist.iter().any(|a| a == base)
    }
}

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str {
        "system.exec"
    }
    fn description(&self) -> &str {
        "Run an allowlisted command (argv array, no shell) in the workspace and return its output."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "cmd": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Program and arguments, e.g. [\"ls\", \"-la\"]"
                },
                "timeout": { "type": "integer", "description": "Seconds (default 5, max 30)" },
                "max_bytes": { "type": "integer", "description": "Output cap in bytes (default 20000)" }
            },
            "required": ["cmd"],
            "additionalProperties": false
        })
    }
    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let cmd: Vec<String> = arguments
            .get("cmd")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let Some((program, rest)) = cmd.split_first() else {
            return Err(ToolError::InvalidArguments {
                name: self.name().into(),
                reason: "'cmd' must be a non-empty array of strings".into(),
            });
        };

        if !self.is_allowed(program) {
            warn!(program = %program, "Command rejected by allowlist");
            return Err(ToolError::Execution {
                name: self.name().into(),
                reason: format!("command '{program}' is not in the allowlist"),
            });
        }

        let timeout_secs =
            optional_u64(arguments, "timeout", DEFAULT_TIMEOUT_SECS).min(MAX_TIMEOUT_SECS);
        let max_bytes = optional_u64(arguments, "max_bytes", OUTPUT_CAP_BYTES) as usize;

        debug!(program = %program, args = rest.len(), "Executing allowlisted command");
        let future = Command::new(program)
            .args(rest)
            .current_dir(&self.root)
            .output();
        let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), future).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::Execution {
                    name: self.name().into(),
                    reason: format!("failed to run '{program}': {e}"),
                });
            }
            Err(_) => {
                return Err(ToolError::Timeout {
                    name: self.name().into(),
                    timeout_secs,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (stdout, stdout_truncated) = truncate_utf8(&stdout, max_bytes);
        let (stderr, stderr_truncated) = truncate_utf8(&stderr, max_bytes);
        Ok(json!({
            "status": if output.status.success() { "ok" } else { "error" },
            "exit_code": output.status.code(),
            "stdout": stdout,
            "stderr": stderr,
            "truncated": stdout_truncated || stderr_truncated,
        })
        .to_string())
    }
}
