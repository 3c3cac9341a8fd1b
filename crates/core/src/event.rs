//! Step events and the observer side channel.
//!
//! The loop emits a [`StepEvent`] for every tool call it issues and every
//! result or error that comes back. Delivery is fire-and-forget: observers
//! are a pure output channel and can never affect loop correctness. The
//! `Done` variant is the stream terminator appended by whoever drives a
//! streaming channel (the loop itself only emits call/result/error).

use serde::{Deserialize, Serialize};

use crate::tool::JsonMap;

/// One step notification, tagged by phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum StepEvent {
    /// A tool call is about to execute
    Call { name: String, arguments: JsonMap },

    /// A tool call succeeded
    Result { name: String, result: String },

    /// A tool call failed (the turn continues)
    Error { name: String, error: String },

    /// Stream sentinel: the turn is over
    Done { status: String, text: String },
}

impl StepEvent {
    /// The phase tag, usable as an SSE event name.
    pub fn phase(&self) -> &'static str {
        match self {
            StepEvent::Call { .. } => "call",
            StepEvent::Result { .. } => "result",
            StepEvent::Error { .. } => "error",
            StepEvent::Done { .. } => "done",
        }
    }
}

/// Fire-and-forget sink for step events.
///
/// Implementations must not block; the loop calls this inline between tool
/// executions.
pub trait StepObserver: Send + Sync {
    fn on_step(&self, event: &StepEvent);
}

impl<F> StepObserver for F
where
    F: Fn(&StepEvent) + Send + Sync,
{
    fn on_step(&self, event: &StepEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_event_serializes_with_phase_tag() {
        let mut args = JsonMap::new();
        args.insert("directory".into(), json!("/tmp"));
        let ev = StepEvent::Call {
            name: "files.list".into(),
            arguments: args,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["phase"], "call");
        assert_eq!(json["name"], "files.list");
        assert_eq!(json["arguments"]["directory"], "/tmp");
        assert_eq!(ev.phase(), "call");
    }

    #[test]
    fn error_event_roundtrip() {
        let ev = StepEvent::Error {
            name: "git.status".into(),
            error: "No domain selected for tool: git.status".into(),
        };
        let text = serde_json::to_string(&ev).unwrap();
        let back: StepEvent = serde_json::from_str(&text).unwrap();
        match back {
            StepEvent::Error { name, error } => {
                assert_eq!(name, "git.status");
                assert!(error.contains("No domain selected"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn done_event_carries_status() {
        let ev = StepEvent::Done {
            status: "completed".into(),
            text: "all set".into(),
        };
        assert_eq!(ev.phase(), "done");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["phase"], "done");
        assert_eq!(json["status"], "completed");
    }

    #[test]
    fn closures_are_observers() {
        let seen = std::sync::Mutex::new(Vec::new());
        let observer = |ev: &StepEvent| {
            seen.lock().unwrap().push(ev.phase());
        };
        observer.on_step(&StepEvent::Result {
            name: "t".into(),
            result: "ok".into(),
        });
        assert_eq!(*seen.lock().unwrap(), vec!["result"]);
    }
}
