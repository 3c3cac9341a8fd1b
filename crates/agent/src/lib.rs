//! # toolgate agent
//!
//! The orchestration layer: the turn loop plus the two routing layers it
//! dispatches through.
//!
//! - [`AgentLoop`] drives one turn: model call, tool execution, result
//!   injection, repeated until a termination condition.
//! - [`DomainRouter`] gates which tools the model sees, grouped by domain.
//! - [`CompositeDispatcher`] aggregates independent tool groups into one
//!   dispatch surface.
//!
//! All three speak `toolgate_core::ToolHandler`, so they stack in any
//! order a caller needs. The standard wiring is a composite of the
//! always-visible assistant group and a domain router over everything
//! else.

pub mod dispatcher;
pub mod loop_runner;
pub mod router;

pub use dispatcher::CompositeDispatcher;
pub use loop_runner::{
    AgentLoop, ConfirmDecision, ConfirmTool, FINAL_TOOL, TurnHooks, TurnOptions, TurnReport,
    TurnStatus,
};
pub use router::DomainRouter;
