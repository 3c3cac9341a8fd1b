//! The turn orchestration loop.
//!
//! One call to [`AgentLoop::run_turn`] covers one user utterance: the loop
//! sends the history and the current manifest to the completion client,
//! executes whatever tools the model requested, appends the results, and
//! repeats until the model answers without tool calls, the designated
//! final tool fires, the step limit hits, or the caller cancels.
//!
//! Failure semantics follow one rule: anything that goes wrong while
//! executing a tool the model asked for is written into the conversation
//! as a tool result so the model can react; anything that goes wrong in
//! the machinery itself (transport, step limit, cancellation) ends the
//! turn with a structured outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use toolgate_core::{
    CancelToken, CompletionClient, CompletionRequest, Conversation, JsonMap, Message, StepEvent,
    StepObserver, StepRecord, ToolError, ToolHandler, TransportError, parse_arguments,
};
use tracing::{debug, info, warn};

/// The designated final tool: invoking it ends the turn with its `text`
/// argument once the round's remaining calls have completed.
pub const FINAL_TOOL: &str = "assistant.final";

/// Per-turn generation and termination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOptions {
    /// Prepended once, only when the conversation starts empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Max tokens per model response
    pub max_tokens: u32,

    /// Hard ceiling on model-call rounds for this turn
    pub max_steps: u32,

    /// When true and the manifest exposes the final tool, plain text is
    /// non-terminal: the loop keeps going until the final tool fires or
    /// the step limit hits.
    pub require_final_tool: bool,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            system_message: None,
            temperature: 0.7,
            max_tokens: 800,
            max_steps: 100,
            require_final_tool: false,
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model produced a final answer
    Completed,

    /// `max_steps` rounds passed without a final answer
    StepLimitExceeded,

    /// The caller cancelled; `text` holds the best partial result
    Cancelled,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Completed => "completed",
            TurnStatus::StepLimitExceeded => "step_limit_exceeded",
            TurnStatus::Cancelled => "cancelled",
        }
    }
}

/// What a turn produced. The conversation itself is mutated in place; the
/// report carries the outcome and the per-call trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReport {
    pub status: TurnStatus,
    pub text: String,
    pub steps: Vec<StepRecord>,
}

/// Verdict of a per-call confirmation hook.
#[derive(Debug, Clone)]
pub enum ConfirmDecision {
    /// Execute the tool normally
    Allow,

    /// Skip execution; the message becomes a synthetic denial result the
    /// model sees in place of the tool's output
    Deny(String),
}

/// Human-in-the-loop gate consulted before each tool execution.
pub trait ConfirmTool: Send + Sync {
    fn confirm(&self, name: &str, arguments: &JsonMap) -> ConfirmDecision;
}

impl<F> ConfirmTool for F
where
    F: Fn(&str, &JsonMap) -> ConfirmDecision + Send + Sync,
{
    fn confirm(&self, name: &str, arguments: &JsonMap) -> ConfirmDecision {
        self(name, arguments)
    }
}

/// Optional per-turn collaborators. All independent: an event sink that
/// must never block, a polled cancellation flag, and a confirmation gate.
#[derive(Default)]
pub struct TurnHooks<'a> {
    pub observer: Option<&'a dyn StepObserver>,
    pub cancel: Option<&'a CancelToken>,
    pub confirm: Option<&'a dyn ConfirmTool>,
}

impl<'a> TurnHooks<'a> {
    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    fn emit(&self, event: StepEvent) {
        if let Some(observer) = self.observer {
            observer.on_step(&event);
        }
    }
}

/// Drives turns against a completion client and a composed tool handler.
pub struct AgentLoop {
    client: Arc<dyn CompletionClient>,
    tools: Arc<dyn ToolHandler>,
}

impl AgentLoop {
    pub fn new(client: Arc<dyn CompletionClient>, tools: Arc<dyn ToolHandler>) -> Self {
        Self { client, tools }
    }

    /// Run one turn. Appends to `conversation` in place; every append is
    /// one whole message. Only transport failures return `Err` — step
    /// limit and cancellation are statuses on the report.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
        options: &TurnOptions,
        hooks: TurnHooks<'_>,
    ) -> Result<TurnReport, TransportError> {
        if conversation.is_empty() {
            if let Some(system) = &options.system_message {
                conversation.push(Message::system(system));
            }
        }
        conversation.push(Message::user(user_text));

        let mut steps: Vec<StepRecord> = Vec::new();
        let mut partial_text = String::new();

        for round in 0..options.max_steps {
            if hooks.cancelled() {
                info!(round, "Turn cancelled before model call");
                return Ok(TurnReport {
                    status: TurnStatus::Cancelled,
                    text: partial_text,
                    steps,
                });
            }

            let manifest = self.tools.available_tools();
            let has_final_tool = manifest.iter().any(|spec| spec.name == FINAL_TOOL);
            debug!(round, tools = manifest.len(), "Requesting completion");

            let response = self
                .client
                .complete(CompletionRequest {
                    messages: conversation.messages.clone(),
                    tools: manifest,
                    temperature: options.temperature,
                    max_tokens: options.max_tokens,
                })
                .await?;

            let content = response.content.trim().to_string();
            if !content.is_empty() {
                partial_text = content.clone();
            }

            if response.is_plain() {
                if content.is_empty() {
                    // never a valid final answer; ask again
                    warn!(round, "Empty model response with no tool calls");
                    conversation.push(Message::assistant(""));
                    continue;
                }
                if options.require_final_tool && has_final_tool {
                    debug!(round, "Plain text while the final tool is required; continuing");
                    conversation.push(Message::assistant(&content));
                    continue;
                }
                conversation.push(Message::assistant(&content));
                return Ok(TurnReport {
                    status: TurnStatus::Completed,
                    text: content,
                    steps,
                });
            }

            // Tool round: one assistant message with N calls is always
            // followed by exactly N tool messages, in call order.
            let calls = response.tool_calls.clone();
            conversation.push(Message::assistant_with_calls(&response.content, calls.clone()));

            let mut final_text: Option<String> = None;
            let mut cancelled_mid_round = false;

            for call in &calls {
                let arguments = parse_arguments(&call.arguments);

                if !cancelled_mid_round && hooks.cancelled() {
                    cancelled_mid_round = true;
                }
                if cancelled_mid_round {
                    // Pairing must hold even on cancellation: remaining
                    // calls get a synthetic result instead of executing.
                    let payload = json!({
                        "status": "cancelled",
                        "message": "turn cancelled before this call executed",
                    })
                    .to_string();
                    conversation.push(Message::tool_result(&call.id, &call.name, &payload));
                    steps.push(StepRecord {
                        name: call.name.clone(),
                        arguments,
                        result: payload,
                    });
                    continue;
                }

                hooks.emit(StepEvent::Call {
                    name: call.name.clone(),
                    arguments: arguments.clone(),
                });

                if let Some(confirm) = hooks.confirm {
                    if let ConfirmDecision::Deny(message) = confirm.confirm(&call.name, &arguments)
                    {
                        warn!(tool = %call.name, "Tool call denied by confirmation hook");
                        let payload = json!({
                            "status": "denied",
                            "message": message,
                        })
                        .to_string();
                        hooks.emit(StepEvent::Result {
                            name: call.name.clone(),
                            result: payload.clone(),
                        });
                        conversation.push(Message::tool_result(&call.id, &call.name, &payload));
                        steps.push(StepRecord {
                            name: call.name.clone(),
                            arguments,
                            result: payload,
                        });
                        continue;
                    }
                }

                let result = match self.tools.dispatch(&call.name, &arguments).await {
                    Ok(result) => {
                        debug!(tool = %call.name, "Tool call succeeded");
                        hooks.emit(StepEvent::Result {
                            name: call.name.clone(),
                            result: result.clone(),
                        });
                        if call.name == FINAL_TOOL {
                            final_text = Some(
                                arguments
                                    .get("text")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string(),
                            );
                        }
                        result
                    }
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool call failed");
                        hooks.emit(StepEvent::Error {
                            name: call.name.clone(),
                            error: e.to_string(),
                        });
                        self.error_payload(&e)
                    }
                };

                conversation.push(Message::tool_result(&call.id, &call.name, &result));
                steps.push(StepRecord {
                    name: call.name.clone(),
                    arguments,
                    result,
                });
            }

            if let Some(text) = final_text {
                info!(round, "Final tool invoked, ending turn");
                return Ok(TurnReport {
                    status: TurnStatus::Completed,
                    text,
                    steps,
                });
            }
            if cancelled_mid_round {
                info!(round, "Turn cancelled between tool calls");
                return Ok(TurnReport {
                    status: TurnStatus::Cancelled,
                    text: partial_text,
                    steps,
                });
            }
        }

        warn!(max_steps = options.max_steps, "Step limit exceeded without a final answer");
        Ok(TurnReport {
            status: TurnStatus::StepLimitExceeded,
            text: String::new(),
            steps,
        })
    }

    /// The tool-result payload standing in for a failed call. Routing
    /// errors include the currently visible tool names so the model can
    /// self-correct instead of retrying the same name.
    fn error_payload(&self, error: &ToolError) -> String {
        match error {
            ToolError::Unrecognized(_)
            | ToolError::UnknownDomain(_)
            | ToolError::NoDomainSelected(_) => {
                let visible: Vec<String> = self
                    .tools
                    .available_tools()
                    .into_iter()
                    .map(|spec| spec.name)
                    .collect();
                json!({
                    "notice": "tool_call_error",
                    "error": error.to_string(),
                    "available_tools": visible,
                })
                .to_string()
            }
            other => json!({
                "notice": "tool_call_error",
                "error": other.to_string(),
            })
            .to_string(),
        }
    }
}
