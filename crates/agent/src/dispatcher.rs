//! Composite dispatch over an ordered list of tool-group handlers.
//!
//! Dispatch tries each handler in registration order and returns on the
//! first one that recognizes the name. Name collisions are not rejected:
//! first registered wins, and a warning is logged when a later handler
//! shadows an existing spec so the footgun shows up in logs.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use toolgate_core::{JsonMap, ToolError, ToolHandler, ToolSpec};
use tracing::{debug, warn};

/// Aggregates independent tool-group handlers into one logical handler.
pub struct CompositeDispatcher {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl CompositeDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler. Earlier handlers win on name collisions.
    pub fn push(&mut self, handler: Arc<dyn ToolHandler>) {
        let taken: HashSet<String> = self
            .handlers
            .iter()
            .flat_map(|h| h.available_tools())
            .map(|spec| spec.name)
            .collect();
        for spec in handler.available_tools() {
            if taken.contains(&spec.name) {
                warn!(tool = %spec.name, "Tool name shadowed by an earlier handler; first registered wins");
            }
        }
        self.handlers.push(handler);
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.push(handler);
        self
    }
}

impl Default for CompositeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for CompositeDispatcher {
    fn available_tools(&self) -> Vec<ToolSpec> {
        self.handlers
            .iter()
            .flat_map(|h| h.available_tools())
            .collect()
    }

    async fn dispatch(
        &self,
        name: &str,
        arguments: &JsonMap,
    ) -> std::result::Result<String, ToolError> {
        let mut last_unrecognized: Option<ToolError> = None;
        for handler in &self.handlers {
            match handler.dispatch(name, arguments).await {
                Err(e) if e.is_unrecognized() => {
                    debug!(tool = %name, "Handler did not recognize tool, trying next");
                    last_unrecognized = Some(e);
                }
                other => return other,
            }
        }
        Err(last_unrecognized.unwrap_or_else(|| ToolError::Unrecognized(name.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use toolgate_core::Tool;

    /// A handler owning every tool under one dot prefix, counting how
    /// often its execution logic actually runs.
    struct PrefixGroup {
        prefix: &'static str,
        executions: AtomicUsize,
    }

    impl PrefixGroup {
        fn new(prefix: &'static str) -> Self {
            Self {
                prefix,
                executions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolHandler for PrefixGroup {
        fn available_tools(&self) -> Vec<ToolSpec> {
            vec![ToolSpec {
                name: format!("{}.run", self.prefix),
                description: format!("{} group", self.prefix),
                parameters: json!({"type": "object", "properties": {}}),
            }]
        }

        async fn dispatch(
            &self,
            name: &str,
            _arguments: &JsonMap,
        ) -> std::result::Result<String, ToolError> {
            if !name.starts_with(&format!("{}.", self.prefix)) {
                return Err(ToolError::Unrecognized(name.to_string()));
            }
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(format!("handled by {}", self.prefix))
        }
    }

    #[tokio::test]
    async fn second_handler_gets_the_call_without_running_first() {
        let files = Arc::new(PrefixGroup::new("files"));
        let git = Arc::new(PrefixGroup::new("git"));
        let dispatcher = CompositeDispatcher::new()
            .with(files.clone())
            .with(git.clone());

        let result = dispatcher.dispatch("git.run", &JsonMap::new()).await.unwrap();
        assert_eq!(result, "handled by git");
        assert_eq!(files.executions.load(Ordering::SeqCst), 0);
        assert_eq!(git.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manifest_concatenates_in_registration_order() {
        let dispatcher = CompositeDispatcher::new()
            .with(Arc::new(PrefixGroup::new("files")))
            .with(Arc::new(PrefixGroup::new("git")));
        let names: Vec<String> = dispatcher
            .available_tools()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["files.run", "git.run"]);
    }

    #[tokio::test]
    async fn unknown_name_surfaces_unrecognized() {
        let dispatcher = CompositeDispatcher::new()
            .with(Arc::new(PrefixGroup::new("files")))
            .with(Arc::new(PrefixGroup::new("git")));
        let err = dispatcher
            .dispatch("web.fetch", &JsonMap::new())
            .await
            .unwrap_err();
        assert!(err.is_unrecognized());
    }

    #[tokio::test]
    async fn empty_composite_rejects_everything() {
        let dispatcher = CompositeDispatcher::new();
        let err = dispatcher
            .dispatch("files.run", &JsonMap::new())
            .await
            .unwrap_err();
        assert!(err.is_unrecognized());
    }

    /// A handler that recognizes a name but fails: the composite must stop
    /// there, not keep trying later handlers.
    struct FailingGroup;

    #[async_trait]
    impl ToolHandler for FailingGroup {
        fn available_tools(&self) -> Vec<ToolSpec> {
            vec![]
        }

        async fn dispatch(
            &self,
            name: &str,
            _arguments: &JsonMap,
        ) -> std::result::Result<String, ToolError> {
            Err(ToolError::Execution {
                name: name.to_string(),
                reason: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn recognized_failure_is_not_retried_on_later_handlers() {
        let fallback = Arc::new(PrefixGroup::new("files"));
        let dispatcher = CompositeDispatcher::new()
            .with(Arc::new(FailingGroup))
            .with(fallback.clone());

        let err = dispatcher
            .dispatch("files.run", &JsonMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
        assert_eq!(fallback.executions.load(Ordering::SeqCst), 0);
    }

    struct EchoName;

    #[async_trait]
    impl Tool for EchoName {
        fn name(&self) -> &str {
            "shared.echo"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: &JsonMap) -> std::result::Result<String, ToolError> {
            Ok("first".into())
        }
    }

    struct EchoNameSecond;

    #[async_trait]
    impl Tool for EchoNameSecond {
        fn name(&self) -> &str {
            "shared.echo"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: &JsonMap) -> std::result::Result<String, ToolError> {
            Ok("second".into())
        }
    }

    #[tokio::test]
    async fn collisions_resolve_to_first_registered() {
        let mut first = toolgate_core::ToolRegistry::new();
        first.register(Box::new(EchoName));
        let mut second = toolgate_core::ToolRegistry::new();
        second.register(Box::new(EchoNameSecond));

        let dispatcher = CompositeDispatcher::new()
            .with(Arc::new(first))
            .with(Arc::new(second));
        let result = dispatcher
            .dispatch("shared.echo", &JsonMap::new())
            .await
            .unwrap();
        assert_eq!(result, "first");
    }
}
