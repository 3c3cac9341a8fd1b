//! Tool abstractions: specs, the per-tool trait, and the group handler
//! contract the orchestration layers compose.
//!
//! Two levels exist on purpose. A [`Tool`] is one named capability with a
//! schema. A [`ToolHandler`] is a group of them behind a single dispatch
//! surface; registries, composite dispatchers, and the domain router all
//! implement it, so the loop never cares which layer it is talking to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Parsed tool arguments: a JSON object's key/value map.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Immutable descriptor for one tool, consumed by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Dot-namespaced name, e.g. `"files.list"`
    pub name: String,

    /// Natural-language description
    pub description: String,

    /// JSON Schema for the argument object
    pub parameters: serde_json::Value,
}

/// Parse a raw arguments string the model produced.
///
/// Malformed JSON (or JSON that is not an object) degrades to an empty map
/// instead of failing the step; the tool's own required-field validation is
/// what surfaces to the model.
pub fn parse_arguments(raw: &str) -> JsonMap {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            tracing::debug!(value_type = %json_type_name(&other), "Tool arguments were not an object, using empty map");
            JsonMap::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Tool arguments failed to parse, using empty map");
            JsonMap::new()
        }
    }
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// One named capability the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique dot-namespaced name of this tool (e.g. `"files.list"`).
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool. The output is a pre-serialized string, by
    /// convention JSON text.
    async fn execute(&self, arguments: &JsonMap) -> std::result::Result<String, ToolError>;

    /// The spec advertised for this tool.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A group of tools behind one dispatch surface.
///
/// `dispatch` must return [`ToolError::Unrecognized`] for names the handler
/// does not own, and only for those; any other error means the tool was
/// recognized and failed.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The specs this handler advertises. Pure; no side effects.
    fn available_tools(&self) -> Vec<ToolSpec>;

    /// Execute `name` with parsed arguments.
    async fn dispatch(&self, name: &str, arguments: &JsonMap)
    -> std::result::Result<String, ToolError>;
}

/// A registry of tools forming one tool group.
///
/// Manifest order is registration order. Registering a name twice replaces
/// the earlier tool.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// List all registered tool names, in manifest order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for ToolRegistry {
    fn available_tools(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    async fn dispatch(
        &self,
        name: &str,
        arguments: &JsonMap,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::Unrecognized(name.to_string()))?;
        tool.execute(arguments).await
    }
}
