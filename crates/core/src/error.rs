//! Error types for the toolgate domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own enum; the split that matters most is inside [`ToolError`]:
//! `Unrecognized` means "this handler does not own the name" and is the only
//! variant composite dispatch recovers from. Everything else means the tool
//! was recognized and failed, which is fed back to the model as a tool
//! result rather than aborting the turn.

use thiserror::Error;

/// The top-level error type for toolgate operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by tool-group handlers and the routing layers above them.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The handler does not own this tool name. Recoverable: a composite
    /// dispatcher tries the next handler in order.
    #[error("Unrecognized tool: {0}")]
    Unrecognized(String),

    /// An explicit domain selection named a domain that does not exist.
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    /// No domain is active and the tool name maps to none.
    #[error("No domain selected for tool: {0}")]
    NoDomainSelected(String),

    /// A recognized tool failed while executing.
    #[error("Tool execution failed: {name}: {reason}")]
    Execution { name: String, reason: String },

    /// A recognized tool rejected its arguments.
    #[error("Invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    /// A recognized tool exceeded its own time budget.
    #[error("Tool timed out: {name} after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },
}

impl ToolError {
    /// True when composite dispatch should try the next handler.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, ToolError::Unrecognized(_))
    }
}

/// Errors from the completion transport. Fatal to the turn: the loop does
/// not retry these (retry policy belongs to the client implementation).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("No completion client configured: {0}")]
    NotConfigured(String),
}
