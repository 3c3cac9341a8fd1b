//! Caller-driven session persistence.
//!
//! A snapshot is a plain JSON blob: the conversation, the last final text,
//! and the last turn's step trace. The CLI writes one next to the user and
//! the gateway serves one per session; neither is a core contract.

use serde::{Deserialize, Serialize};

use crate::message::Conversation;
use crate::tool::JsonMap;

/// One recorded tool invocation within a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Tool name as dispatched
    pub name: String,

    /// Parsed arguments the tool received
    pub arguments: JsonMap,

    /// The tool's output, or the error/denial payload that stood in for it
    pub result: String,
}

/// Serializable snapshot of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The full conversation so far
    pub conversation: Conversation,

    /// Final text of the last completed turn
    #[serde(default)]
    pub last_text: String,

    /// Step trace of the last completed turn
    #[serde(default)]
    pub last_steps: Vec<StepRecord>,
}

impl SessionSnapshot {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            last_text: String::new(),
            last_steps: Vec::new(),
        }
    }
}
