//! CompletionClient trait: the abstraction over the model transport.
//!
//! A client takes a message history plus the current tool manifest and
//! returns either final text or a batch of requested tool invocations. The
//! loop treats it as opaque; the wire format is the implementation's
//! business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::message::{Message, ToolCallRequest};
use crate::tool::ToolSpec;

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The conversation so far
    pub messages: Vec<Message>,

    /// Tools currently visible to the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

pub fn default_temperature() -> f32 {
    0.7
}

/// What the model decided: final content, requested tool calls, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Assistant text. May be empty when the response only carries tool
    /// calls.
    #[serde(default)]
    pub content: String,

    /// Requested tool invocations, in the order the model issued them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl CompletionResponse {
    /// True when the model did not request any tool calls.
    pub fn is_plain(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// The completion transport contract.
///
/// Errors are fatal to the calling turn; the loop never retries. Any retry
/// or failover policy lives inside the implementation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// A human-readable name for this client (e.g. "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send the conversation and manifest, get the model's decision.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, TransportError>;
}
