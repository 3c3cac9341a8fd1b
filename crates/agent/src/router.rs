//! Domain gating: bound the manifest shown to the model per step.
//!
//! Tools are grouped into named domains. The router always advertises a
//! small set of selector meta-tools (`domain.list` plus one `domain.<key>`
//! per domain) and, when a domain is active, that domain's own tools.
//! Calling a domain-prefixed tool directly switches the active domain
//! implicitly, so the model never strictly needs the selectors.
//!
//! The active-domain cell is a `Mutex<Option<String>>` held only for the
//! read or write of the option, never across an await. That makes each
//! switch atomic but does not serialize whole turns; a router shared by
//! concurrent turns must be serialized by the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use toolgate_core::{JsonMap, ToolError, ToolHandler, ToolSpec};
use tracing::{debug, info};

const SELECTOR_PREFIX: &str = "domain.";
const LIST_SELECTOR: &str = "domain.list";

/// Routes tool calls to one of several named domains, exposing only the
/// selector tools plus the active domain's tools.
pub struct DomainRouter {
    /// Registration order is manifest order.
    domains: Vec<(String, Arc<dyn ToolHandler>)>,

    /// First dot-prefix of a tool name, lowercased, to domain key.
    prefixes: HashMap<String, String>,

    /// Survives across turns until explicitly changed.
    active: Mutex<Option<String>>,
}

impl DomainRouter {
    pub fn new() -> Self {
        Self {
            domains: Vec::new(),
            prefixes: HashMap::new(),
            active: Mutex::new(None),
        }
    }

    /// Register a domain. Its key doubles as the default tool-name prefix
    /// mapping to it.
    pub fn with_domain(mut self, key: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        let key = key.into();
        self.prefixes
            .entry(key.to_lowercase())
            .or_insert_with(|| key.clone());
        self.domains.push((key, handler));
        self
    }

    /// Map an extra tool-name prefix onto an already-registered domain.
    pub fn with_prefix(mut self, prefix: impl Into<String>, key: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into().to_lowercase(), key.into());
        self
    }

    /// The currently active domain, if any.
    pub fn active_domain(&self) -> Option<String> {
        self.lock_active().clone()
    }

    /// The registered domain keys, in registration order.
    pub fn domain_keys(&self) -> Vec<String> {
        self.domains.iter().map(|(k, _)| k.clone()).collect()
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock only means a holder panicked mid-update of an
        // Option; the value itself is still usable.
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn handler(&self, key: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.domains
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, h)| h)
    }

    /// The always-visible selector meta-tools.
    fn selector_specs(&self) -> Vec<ToolSpec> {
        let empty_params = json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false,
        });

        let mut specs = vec![ToolSpec {
            name: LIST_SELECTOR.into(),
            description: format!(
                "List the available tool domains ({}).",
                self.domain_keys().join(", ")
            ),
            parameters: empty_params.clone(),
        }];

        for (key, _) in &self.domains {
            let parameters = if key == "files" {
                // The files selector can forward straight to a listing or
                // search, saving the model a round trip.
                json!({
                    "type": "object",
                    "properties": {
                        "directory": {
                            "type": "string",
                            "description": "Optional directory to list immediately after selecting",
                        },
                        "path": {
                            "type": "string",
                            "description": "Alias for 'directory'",
                        },
                        "pattern": {
                            "type": "string",
                            "description": "Optional glob; when given, searches instead of listing",
                        },
                    },
                    "additionalProperties": false,
                })
            } else {
                empty_params.clone()
            };
            specs.push(ToolSpec {
                name: format!("{SELECTOR_PREFIX}{key}"),
                description: format!("Select the '{key}' domain to access its tools."),
                parameters,
            });
        }
        specs
    }

    /// Handle an explicit `domain.<key>` selection.
    async fn select(&self, key: &str, arguments: &JsonMap) -> Result<String, ToolError> {
        let Some(handler) = self.handler(key) else {
            return Err(ToolError::UnknownDomain(key.to_string()));
        };

        *self.lock_active() = Some(key.to_string());
        info!(domain = %key, "Domain selected");

        let tools: Vec<String> = handler
            .available_tools()
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        let confirmation = json!({
            "status": "ok",
            "selected": key,
            "tools": tools,
        })
        .to_string();

        // Convenience forwarding for the files domain: an immediate list
        // or search when the selection call already names a target. A
        // forwarding failure falls back to the plain confirmation.
        if key == "files" {
            if let Some((tool, forwarded)) = files_forward_call(arguments) {
                match handler.dispatch(tool, &forwarded).await {
                    Ok(result) => return Ok(result),
                    Err(e) => {
                        debug!(error = %e, tool, "Selector forwarding failed, returning confirmation");
                    }
                }
            }
        }

        Ok(confirmation)
    }

    /// Infer a domain key from the prefix before the first dot.
    fn infer(&self, name: &str) -> Option<&String> {
        let prefix = name.split('.').next()?.to_lowercase();
        self.prefixes.get(&prefix)
    }
}

/// Build the forwarded call for `domain.files`, if the selection carries a
/// target. `pattern` means search, a bare directory means list.
fn files_forward_call(arguments: &JsonMap) -> Option<(&'static str, JsonMap)> {
    let directory = arguments
        .get("directory")
        .or_else(|| arguments.get("path"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty());
    let pattern = arguments
        .get("pattern")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty());

    match (directory, pattern) {
        (_, Some(pattern)) => {
            let mut forwarded = JsonMap::new();
            if let Some(dir) = directory {
                forwarded.insert("directory".into(), json!(dir));
            }
            forwarded.insert("pattern".into(), json!(pattern));
            Some(("files.search", forwarded))
        }
        (Some(dir), None) => {
            let mut forwarded = JsonMap::new();
            forwarded.insert("directory".into(), json!(dir));
            Some(("files.list", forwarded))
        }
        (None, None) => None,
    }
}

impl Default for DomainRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for DomainRouter {
    fn available_tools(&self) -> Vec<ToolSpec> {
        let mut specs = self.selector_specs();
        let active = self.lock_active().clone();
        if let Some(key) = active {
            if let Some(handler) = self.handler(&key) {
                specs.extend(handler.available_tools());
            }
        }
        specs
    }

    async fn dispatch(
        &self,
        name: &str,
        arguments: &JsonMap,
    ) -> std::result::Result<String, ToolError> {
        if name == LIST_SELECTOR {
            return Ok(json!({ "domains": self.domain_keys() }).to_string());
        }
        if let Some(key) = name.strip_prefix(SELECTOR_PREFIX) {
            return self.select(key, arguments).await;
        }

        // Direct use of a domain-prefixed tool switches the domain
        // implicitly.
        let key = {
            let inferred = self.infer(name).cloned();
            let mut active = self.lock_active();
            if let Some(key) = inferred {
                if active.as_deref() != Some(key.as_str()) {
                    info!(domain = %key, tool = %name, "Implicit domain switch");
                    *active = Some(key.clone());
                }
            }
            match active.clone() {
                Some(key) => key,
                None => return Err(ToolError::NoDomainSelected(name.to_string())),
            }
        };

        let handler = self
            .handler(&key)
            .ok_or_else(|| ToolError::UnknownDomain(key.clone()))?;
        handler.dispatch(name, arguments).await
    }
}
