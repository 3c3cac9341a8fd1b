//! OpenAI-compatible chat-completions client.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, and any endpoint that
//! exposes the `/v1/chat/completions` wire format with tool calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolgate_core::{
    CompletionClient, CompletionRequest, CompletionResponse, Message, Role, ToolCallRequest,
    ToolSpec, TransportError,
};
use tracing::{debug, warn};

/// A client for any OpenAI-compatible completions endpoint.
///
/// The model identifier is fixed at construction; every request goes to
/// `{base_url}/chat/completions` with `tool_choice: "auto"` when tools
/// are attached.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new OpenAI-compatible client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Create an OpenRouter client (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an Ollama client (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    /// The model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
                name: m.tool_name.clone(),
            })
            .collect()
    }

    /// Convert tool specs to OpenAI API format.
    fn to_api_tools(tools: &[ToolSpec]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!("auto");
        }

        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(e.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(TransportError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(TransportError::Auth(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(TransportError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            TransportError::InvalidResponse(format!("Failed to parse response: {e}"))
        })?;

        if let Some(usage) = &api_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_constructor() {
        let client = OpenAiCompatClient::openrouter("sk-test", "anthropic/claude-sonnet-4");
        assert_eq!(client.name(), "openrouter");
        assert!(client.base_url.contains("openrouter.ai"));
        assert_eq!(client.model(), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn ollama_constructor() {
        let client = OpenAiCompatClient::ollama(None, "llama3");
        assert_eq!(client.name(), "ollama");
        assert!(client.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_stripped_from_base_url() {
        let client = OpenAiCompatClient::new("custom", "http://host/v1/", "k", "m");
        assert_eq!(client.base_url, "http://host/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatClient::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_with_calls(
            "",
            vec![ToolCallRequest {
                id: "call_1".into(),
                name: "files.read".into(),
                arguments: r#"{"path":"notes.txt"}"#.into(),
            }],
        );
        let api_msgs = OpenAiCompatClient::to_api_messages(&[msg]);
        assert_eq!(api_msgs.len(), 1);
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc.len(), 1);
        assert_eq!(tc[0].function.name, "files.read");
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "files.read", "file contents");
        let api_msgs = OpenAiCompatClient::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api_msgs[0].name.as_deref(), Some("files.read"));
    }

    #[test]
    fn tool_spec_conversion() {
        let tools = vec![ToolSpec {
            name: "files.list".into(),
            description: "List directory entries".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatClient::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "files.list");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn tool_message_serializes_name_and_call_id() {
        let msg = Message::tool_result("call_9", "git.status", "{\"status\":\"ok\"}");
        let api_msgs = OpenAiCompatClient::to_api_messages(&[msg]);
        let json = serde_json::to_value(&api_msgs[0]).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_9");
        assert_eq!(json["name"], "git.status");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn parse_response_with_content() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hi there")
        );
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 12);
    }

    #[test]
    fn parse_response_with_tool_calls() {
        let data = r#"{
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "domain.list", "arguments": "{}"}
                }]
            }}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let msg = &parsed.choices[0].message;
        assert!(msg.content.is_none());
        let tc = msg.tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].id, "call_abc");
        assert_eq!(tc[0].function.name, "domain.list");
        assert_eq!(tc[0].function.arguments, "{}");
    }

    #[test]
    fn parse_response_without_choices() {
        let data = r#"{"choices": []}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
