//! Flow execution runtime
//!
//! This crate walks a flow graph one node at a time: it resolves
//! `{{node.param}}` references, dispatches each node to its task body,
//! evaluates edge guards and records what every run produced.

pub mod condition;
pub mod dispatcher;
mod executor;
mod graph;
mod registry;
pub mod resolver;
mod runtime;
mod status;
mod store;
mod validate;

pub use executor::{collect_inputs, finalize_result, FlowExecutor, EMPTY_RESULT_MESSAGE};
pub use graph::{FlowGraph, OutgoingEdge};
pub use registry::{InstructionMetadata, InstructionRegistry};
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use status::RunStatusBoard;
pub use store::{
    InMemoryFlowRepository, InMemoryHistoryStore, JsonFileFlowRepository, JsonFileHistoryStore,
    DEFAULT_HISTORY_LIMIT,
};
pub use validate::{upstream_variables, validate_flow, FlowPlan, UpstreamNode, Variable};
