//! The assistant domain: the single designated final tool.

use async_trait::async_trait;
use serde_json::json;
use toolgate_core::{JsonMap, Tool, ToolError, ToolRegistry};

use crate::args::required_str;

/// Build the `assistant` domain registry.
pub fn assistant_domain() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FinalTool));
    registry
}

/// `assistant.final` marks the end of a turn: the loop takes its `text`
/// argument as the turn's final answer. The tool itself only echoes a
/// confirmation envelope.
struct FinalTool;

#[async_trait]
impl Tool for FinalTool {
    fn name(&self) -> &str {
        "assistant.final"
    }
    fn description(&self) -> &str {
        "Finish the turn with a final answer for the user. Call this exactly once, when you are done."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "The final answer" }
            },
            "required": ["text"],
            "additionalProperties": false
        })
    }
    async fn execute(&self, arguments: &JsonMap) -> Result<String, ToolError> {
        let text = required_str(arguments, "text", self.name())?;
        Ok(json!({ "status": "ok", "final_text": text }).to_string())
    }
}
