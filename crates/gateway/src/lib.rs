//! HTTP gateway for toolgate.
//!
//! Exposes the turn API over REST: run a turn (plain or SSE-streamed),
//! inspect the manifest, and manage sessions. Each session owns its own
//! conversation and domain router, so the active domain persists across
//! turns; turns against one session are serialized by the session lock.
//!
//! Built on Axum.

pub mod api_v1;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use chrono::{DateTime, Utc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use toolgate_agent::{CompositeDispatcher, DomainRouter};
use toolgate_config::AppConfig;
use toolgate_core::{
    CancelToken, CompletionClient, Conversation, StepRecord, ToolHandler,
};
use toolgate_security::WorkspaceGuard;
use toolgate_tools::{assistant_domain, files_domain, git_domain, system_domain};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub client: Arc<dyn CompletionClient>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

pub type SharedState = Arc<GatewayState>;

/// One session: a conversation plus its own router instance.
///
/// `body` is an async mutex held across the whole turn, which is what
/// serializes turns against the same session. `cancel` is the slot the
/// cancel endpoint trips; it is replaced with a fresh token at turn start.
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    cancel: Mutex<CancelToken>,
    pub body: tokio::sync::Mutex<SessionBody>,
}

pub struct SessionBody {
    pub conversation: Conversation,
    pub handler: Arc<dyn ToolHandler>,
    pub last_text: String,
    pub last_steps: Vec<StepRecord>,
}

impl Session {
    fn new(handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            cancel: Mutex::new(CancelToken::new()),
            body: tokio::sync::Mutex::new(SessionBody {
                conversation: Conversation::new(),
                handler,
                last_text: String::new(),
                last_steps: Vec::new(),
            }),
        }
    }

    /// Install a fresh token for the coming turn and return it.
    pub fn arm_cancel(&self) -> CancelToken {
        let token = CancelToken::new();
        *lock(&self.cancel) = token.clone();
        token
    }

    /// Trip the current turn's token (a no-op when no turn is running).
    pub fn cancel(&self) {
        lock(&self.cancel).cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GatewayState {
    pub fn new(config: AppConfig, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            config,
            client,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        lock(&self.sessions).get(id).cloned()
    }

    /// Fetch an existing session or create one (evicting the oldest when
    /// the store is full). Returns `None` when an explicit unknown id was
    /// requested.
    pub fn session_or_create(&self, id: Option<&str>) -> Option<Arc<Session>> {
        let mut sessions = lock(&self.sessions);
        if let Some(id) = id {
            return sessions.get(id).cloned();
        }

        if sessions.len() >= self.config.gateway.max_sessions {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, s)| s.created_at)
                .map(|(k, _)| k.clone())
            {
                warn!(session_id = %oldest, "Session store full, evicting oldest");
                sessions.remove(&oldest);
            }
        }

        let session = Arc::new(Session::new(build_handler(&self.config)));
        sessions.insert(session.id.clone(), session.clone());
        info!(session_id = %session.id, "Session created");
        Some(session)
    }

    pub fn remove_session(&self, id: &str) -> bool {
        lock(&self.sessions).remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

/// Standard tool wiring: the assistant domain (so `assistant.final` is
/// always visible) composed ahead of a domain router gating `files`,
/// `git`, and `system`.
pub fn build_handler(config: &AppConfig) -> Arc<dyn ToolHandler> {
    let root = config.workspace_root();
    let guard = Arc::new(
        WorkspaceGuard::new(&root).with_enforcement(config.workspace.enforce),
    );
    let router = DomainRouter::new()
        .with_domain("files", Arc::new(files_domain(guard)))
        .with_domain("git", Arc::new(git_domain(root.clone())))
        .with_domain(
            "system",
            Arc::new(system_domain(
                root,
                config.workspace.exec_allowlist.clone(),
            )),
        );
    Arc::new(
        CompositeDispatcher::new()
            .with(Arc::new(assistant_domain()))
            .with(Arc::new(router)),
    )
}

/// Build the full gateway router with its middleware layers.
pub fn build_router(state: SharedState) -> Router {
    api_v1::v1_router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(localhost_cors())
        .layer(TraceLayer::new_for_http())
}

/// CORS for browser clients served from the same machine: any method and
/// header, but only localhost origins.
fn localhost_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _| {
            origin.to_str().is_ok_and(origin_is_localhost)
        }))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn origin_is_localhost(origin: &str) -> bool {
    let Some(host) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };
    for local in ["localhost", "127.0.0.1", "[::1]"] {
        if let Some(rest) = host.strip_prefix(local) {
            if rest.is_empty() || rest.starts_with(':') {
                return true;
            }
        }
    }
    false
}

/// Start the gateway HTTP server and serve until the process exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let client = toolgate_providers::build_from_config(&config)?;
    let state = Arc::new(GatewayState::new(config, client));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
