//! # toolgate core
//!
//! Domain types, traits, and error definitions for the toolgate agent
//! runtime. This crate has no framework dependencies; it defines the
//! contracts every other crate implements against.
//!
//! The seams are traits: [`ToolHandler`] for anything that can advertise
//! and dispatch tools (registries, composites, the domain router) and
//! [`CompletionClient`] for the model transport. The orchestration loop in
//! the agent crate is written purely against these.

pub mod cancel;
pub mod client;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use cancel::CancelToken;
pub use client::{CompletionClient, CompletionRequest, CompletionResponse};
pub use error::{Error, Result, ToolError, TransportError};
pub use event::{StepEvent, StepObserver};
pub use message::{Conversation, ConversationId, Message, Role, ToolCallRequest};
pub use session::{SessionSnapshot, StepRecord};
pub use tool::{JsonMap, Tool, ToolHandler, ToolRegistry, ToolSpec, parse_arguments};
