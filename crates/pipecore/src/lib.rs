//! Core abstractions for the flow engine
//!
//! This crate provides the data model, task traits, run reports and
//! repository contracts that all other components depend on. It has no
//! runtime logic of its own.

mod error;
pub mod events;
mod flow;
mod instruction;
mod report;
mod run;
mod store;
mod task;
mod value;

pub use error::{FlowDefError, FlowError, StoreError, TaskError};
pub use events::*;
pub use flow::{Edge, EdgeId, Flow, FlowId, Node, NodeId, Position};
pub use instruction::{Direction, Instruction, InstructionSource, ParamKind, Parameter};
pub use report::{ExecutionRecord, ExecutionReport, FileRecord, ProcessResults};
pub use run::{duration_millis, RunContext, RunFailure, RunOutcome, RunReport, RunStatus};
pub use store::{ExecutionHistoryStore, FlowRepository};
pub use task::{Callable, FnBody, ParamDecl, Signature, TaskArgs, TaskBody, TaskContext};
pub use value::{Value, ValueType, TRUTHY_TOKENS};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
