//! `toolgate tools` — print the tool manifest.

use std::sync::Arc;

use toolgate_core::ToolHandler;
use toolgate_security::WorkspaceGuard;
use toolgate_tools::{assistant_domain, files_domain, git_domain, system_domain};

use super::{CliError, load_config, standard_handler};

pub fn run(domain: Option<&str>) -> Result<(), CliError> {
    let config = load_config()?;

    let specs = match domain {
        None => standard_handler(&config).available_tools(),
        Some(key) => {
            let root = config.workspace_root();
            let registry = match key {
                "files" => {
                    let guard = Arc::new(
                        WorkspaceGuard::new(&root).with_enforcement(config.workspace.enforce),
                    );
                    files_domain(guard)
                }
                "git" => git_domain(root),
                "system" => system_domain(root, config.workspace.exec_allowlist.clone()),
                "assistant" => assistant_domain(),
                other => {
                    return Err(CliError::Config(format!(
                        "unknown domain '{other}' (expected files, git, system or assistant)"
                    )));
                }
            };
            registry.available_tools()
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&specs)
            .map_err(|e| CliError::Turn(e.to_string()))?
    );
    Ok(())
}
