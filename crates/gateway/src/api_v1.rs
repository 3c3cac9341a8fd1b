//! The v1 REST API.
//!
//! - `GET    /health`                    — liveness and version
//! - `GET    /v1/tools`                  — the current manifest
//! - `POST   /v1/turn`                   — run one turn, JSON response
//! - `POST   /v1/turn/stream`            — run one turn, SSE step events
//! - `GET    /v1/sessions/{id}`          — session snapshot
//! - `DELETE /v1/sessions/{id}`          — drop a session
//! - `POST   /v1/sessions/{id}/cancel`   — trip the session's cancel token

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use toolgate_agent::{AgentLoop, TurnHooks, TurnOptions, TurnStatus};
use toolgate_core::{Message, SessionSnapshot, StepEvent, StepRecord};

use crate::{SharedState, build_handler};

/// Build the API router. `/health` sits at the root; everything else is
/// under `/v1`.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/tools", get(tools_handler))
        .route("/v1/turn", post(turn_handler))
        .route("/v1/turn/stream", post(turn_stream_handler))
        .route("/v1/sessions/{id}", get(get_session_handler))
        .route(
            "/v1/sessions/{id}",
            axum::routing::delete(delete_session_handler),
        )
        .route("/v1/sessions/{id}/cancel", post(cancel_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    /// Existing session ID (omit to create a new session).
    #[serde(default)]
    pub session_id: Option<String>,

    /// The user's message.
    pub text: String,

    /// System message for a fresh conversation.
    #[serde(default)]
    pub system: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub max_steps: Option<u32>,
    #[serde(default)]
    pub require_final: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: String,
    pub status: TurnStatus,
    pub text: String,
    pub steps: Vec<StepRecord>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn session_not_found(id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("unknown session: {id}"))
}

impl TurnRequest {
    fn options(&self, config: &toolgate_config::AppConfig) -> TurnOptions {
        TurnOptions {
            system_message: self.system.clone(),
            temperature: self.temperature.unwrap_or(config.agent.temperature),
            max_tokens: self.max_tokens.unwrap_or(config.agent.max_tokens),
            max_steps: self.max_steps.unwrap_or(config.agent.max_steps),
            require_final_tool: self
                .require_final
                .unwrap_or(config.agent.require_final_tool),
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct ToolsQuery {
    #[serde(default)]
    session_id: Option<String>,
}

/// The manifest of a session's handler, or of a fresh standard handler
/// when no session is given.
async fn tools_handler(
    State(state): State<SharedState>,
    Query(query): Query<ToolsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let specs = match &query.session_id {
        Some(id) => {
            let session = state.session(id).ok_or_else(|| session_not_found(id))?;
            let body = session.body.lock().await;
            body.handler.available_tools()
        }
        None => build_handler(&state.config).available_tools(),
    };
    Ok(Json(serde_json::json!({ "tools": specs })))
}

async fn turn_handler(
    State(state): State<SharedState>,
    Json(payload): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let session = state
        .session_or_create(payload.session_id.as_deref())
        .ok_or_else(|| session_not_found(payload.session_id.as_deref().unwrap_or("")))?;
    info!(session_id = %session.id, "v1/turn");

    let options = payload.options(&state.config);

    // holding the body lock across the turn serializes turns per session;
    // the token is armed only once this turn owns the session, so a queued
    // turn cannot replace the slot while an earlier one is still running
    let mut body = session.body.lock().await;
    let token = session.arm_cancel();
    let agent = AgentLoop::new(state.client.clone(), body.handler.clone());
    let report = agent
        .run_turn(
            &mut body.conversation,
            &payload.text,
            &options,
            TurnHooks {
                cancel: Some(&token),
                ..TurnHooks::default()
            },
        )
        .await
        .map_err(|e| {
            warn!(session_id = %session.id, error = %e, "Turn failed");
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        })?;

    body.last_text = report.text.clone();
    body.last_steps = report.steps.clone();

    Ok(Json(TurnResponse {
        session_id: session.id.clone(),
        status: report.status,
        text: report.text,
        steps: report.steps,
        messages: body.conversation.messages.clone(),
    }))
}

/// Same contract as `/v1/turn`, but the response is an SSE stream: one
/// event per step (`call`/`result`/`error`) and a terminating `done`
/// event carrying `{status, text}`.
async fn turn_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<TurnRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let session = state
        .session_or_create(payload.session_id.as_deref())
        .ok_or_else(|| session_not_found(payload.session_id.as_deref().unwrap_or("")))?;
    info!(session_id = %session.id, "v1/turn/stream");

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<StepEvent>();
    let client = state.client.clone();
    let options = payload.options(&state.config);

    tokio::spawn(async move {
        // same ordering as the plain turn handler: own the session first,
        // then arm the cancel slot
        let mut body = session.body.lock().await;
        let token = session.arm_cancel();
        let agent = AgentLoop::new(client, body.handler.clone());
        let observer = {
            let tx = tx.clone();
            move |event: &StepEvent| {
                let _ = tx.send(event.clone());
            }
        };
        let outcome = agent
            .run_turn(
                &mut body.conversation,
                &payload.text,
                &options,
                TurnHooks {
                    observer: Some(&observer),
                    cancel: Some(&token),
                    ..TurnHooks::default()
                },
            )
            .await;
        let done = match outcome {
            Ok(report) => {
                body.last_text = report.text.clone();
                body.last_steps = report.steps;
                StepEvent::Done {
                    status: report.status.as_str().to_string(),
                    text: report.text,
                }
            }
            Err(e) => {
                warn!(error = %e, "Streamed turn failed");
                StepEvent::Done {
                    status: "error".to_string(),
                    text: e.to_string(),
                }
            }
        };
        let _ = tx.send(done);
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.phase()).data(data))
    });
    Ok(Sse::new(stream))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.session(&id).ok_or_else(|| session_not_found(&id))?;
    let body = session.body.lock().await;
    Ok(Json(SessionSnapshot {
        conversation: body.conversation.clone(),
        last_text: body.last_text.clone(),
        last_steps: body.last_steps.clone(),
    }))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.remove_session(&id) {
        info!(session_id = %id, "Session deleted");
        Ok(Json(serde_json::json!({ "status": "deleted" })))
    } else {
        Err(session_not_found(&id))
    }
}

async fn cancel_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.session(&id).ok_or_else(|| session_not_found(&id))?;
    session.cancel();
    info!(session_id = %id, "Cancellation requested");
    Ok(Json(serde_json::json!({ "status": "cancelling" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayState;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    use toolgate_core::{
        CompletionClient, CompletionRequest, CompletionResponse, ToolCallRequest, TransportError,
    };

    struct ScriptedClient {
        responses: Mutex<VecDeque<CompletionResponse>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<CompletionResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, TransportError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::InvalidResponse("script exhausted".into()))
        }
    }

    fn plain(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.into(),
            tool_calls: vec![],
        }
    }

    fn app(responses: Vec<CompletionResponse>) -> Router {
        let mut config = toolgate_config::AppConfig::default();
        config.workspace.root = Some(std::env::temp_dir().display().to_string());
        config.agent.require_final_tool = false;
        let state = Arc::new(GatewayState::new(config, ScriptedClient::new(responses)));
        crate::build_router(state)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = app(vec![]);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn tools_manifest_without_a_session() {
        let app = app(vec![]);
        let response = app
            .oneshot(Request::get("/v1/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let names: Vec<&str> = body["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"assistant.final"));
        assert!(names.contains(&"domain.list"));
        assert!(names.contains(&"domain.files"));
    }

    #[tokio::test]
    async fn turn_creates_a_session_and_returns_the_text() {
        let app = app(vec![plain("Hello from the model")]);
        let response = app
            .oneshot(post_json("/v1/turn", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["text"], "Hello from the model");
        assert!(!body["session_id"].as_str().unwrap().is_empty());
        // user + assistant
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn turn_against_an_existing_session_extends_its_conversation() {
        let app = app(vec![plain("first"), plain("second")]);
        let response = app
            .clone()
            .oneshot(post_json("/v1/turn", serde_json::json!({"text": "one"})))
            .await
            .unwrap();
        let body = json_body(response).await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(post_json(
                "/v1/turn",
                serde_json::json!({"session_id": session_id, "text": "two"}),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["text"], "second");
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn turn_with_unknown_session_is_404() {
        let app = app(vec![plain("never")]);
        let response = app
            .oneshot(post_json(
                "/v1/turn",
                serde_json::json!({"session_id": "missing", "text": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transport_failure_maps_to_bad_gateway() {
        let app = app(vec![]);
        let response = app
            .oneshot(post_json("/v1/turn", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn session_snapshot_get_and_delete() {
        let app = app(vec![plain("remembered")]);
        let response = app
            .clone()
            .oneshot(post_json("/v1/turn", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        let body = json_body(response).await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/v1/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = json_body(response).await;
        assert_eq!(snapshot["last_text"], "remembered");
        assert_eq!(snapshot["conversation"]["messages"].as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/v1/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get(format!("/v1/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_unknown_session_is_404() {
        let app = app(vec![]);
        let response = app
            .oneshot(post_json(
                "/v1/sessions/nope/cancel",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stream_ends_with_a_done_event() {
        let calls = CompletionResponse {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: "call_1".into(),
                name: "assistant.final".into(),
                arguments: r#"{"text":"streamed answer"}"#.into(),
            }],
        };
        let app = app(vec![calls]);
        let response = app
            .oneshot(post_json("/v1/turn/stream", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("event: call"));
        assert!(text.contains("event: result"));
        assert!(text.contains("event: done"));
        assert!(text.contains("streamed answer"));
    }

    /// Like `ScriptedClient`, but the second model call parks on a gate so
    /// the test can act while that turn is in flight.
    struct GatedClient {
        responses: Mutex<VecDeque<CompletionResponse>>,
        calls: std::sync::atomic::AtomicUsize,
        started: tokio::sync::Semaphore,
        gate: tokio::sync::Semaphore,
    }

    impl GatedClient {
        fn new(responses: Vec<CompletionResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: std::sync::atomic::AtomicUsize::new(0),
                started: tokio::sync::Semaphore::new(0),
                gate: tokio::sync::Semaphore::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for GatedClient {
        fn name(&self) -> &str {
            "gated"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, TransportError> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call == 1 {
                self.started.add_permits(1);
                match self.gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(_) => return Err(TransportError::InvalidResponse("gate closed".into())),
                }
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::InvalidResponse("script exhausted".into()))
        }
    }

    #[tokio::test]
    async fn cancel_stops_the_running_turn_not_a_queued_one() {
        let round = CompletionResponse {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: "call_1".into(),
                name: "domain.list".into(),
                arguments: "{}".into(),
            }],
        };
        let client = GatedClient::new(vec![plain("setup"), round, plain("queued answer")]);
        let mut config = toolgate_config::AppConfig::default();
        config.workspace.root = Some(std::env::temp_dir().display().to_string());
        config.agent.require_final_tool = false;
        let state = Arc::new(GatewayState::new(config, client.clone()));
        let app = crate::build_router(state);

        let response = app
            .clone()
            .oneshot(post_json("/v1/turn", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        let id = json_body(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        // first turn parks inside its model call
        let first = tokio::spawn({
            let app = app.clone();
            let id = id.clone();
            async move {
                app.oneshot(post_json(
                    "/v1/turn",
                    serde_json::json!({"session_id": id, "text": "count"}),
                ))
                .await
                .unwrap()
            }
        });
        client.started.acquire().await.unwrap().forget();

        // second turn queues on the same session behind the first
        let second = tokio::spawn({
            let app = app.clone();
            let id = id.clone();
            async move {
                app.oneshot(post_json(
                    "/v1/turn",
                    serde_json::json!({"session_id": id, "text": "again"}),
                ))
                .await
                .unwrap()
            }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // cancelling now must hit the turn that is actually running
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/sessions/{id}/cancel"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        client.gate.add_permits(1);

        let body = json_body(first.await.unwrap()).await;
        assert_eq!(body["status"], "cancelled");

        // the queued turn then runs to completion on a fresh token
        let body = json_body(second.await.unwrap()).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["text"], "queued answer");
    }
}
