use crate::{events::RunId, ExecutionReport, FlowId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-run context threaded through the executor
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub flow_id: FlowId,
    pub cancellation: CancellationToken,
}

impl RunContext {
    pub fn new(flow_id: impl Into<FlowId>) -> Self {
        Self::with_cancellation(flow_id, CancellationToken::new())
    }

    pub fn with_cancellation(flow_id: impl Into<FlowId>, cancellation: CancellationToken) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            flow_id: flow_id.into(),
            cancellation,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Externally visible status of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Terminated,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Terminated => "terminated",
        };
        f.write_str(text)
    }
}

/// Why a run stopped without completing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunFailure {
    /// Task logic at a node failed; the run was aborted there.
    #[serde(rename_all = "camelCase")]
    Node {
        node_id: NodeId,
        instruction_id: String,
        error_message: String,
    },
    /// No eligible edge was left before an end node was reached.
    #[serde(rename_all = "camelCase")]
    EndNotReached { last_node: NodeId },
    /// Every remaining edge pointed back at a node that already ran.
    #[serde(rename_all = "camelCase")]
    CycleDetected { node_id: NodeId, revisited: Vec<NodeId> },
    /// An edge or the start node referenced a node missing from the flow.
    #[serde(rename_all = "camelCase")]
    UnknownNode { node_id: NodeId },
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFailure::Node {
                node_id,
                instruction_id,
                error_message,
            } => write!(
                f,
                "node {} (instruction {}) failed: {}",
                node_id, instruction_id, error_message
            ),
            RunFailure::EndNotReached { last_node } => {
                write!(f, "end node not reached, run stopped after {}", last_node)
            }
            RunFailure::CycleDetected { node_id, revisited } => write!(
                f,
                "cycle detected at {}: edges lead back to {}",
                node_id,
                revisited.join(", ")
            ),
            RunFailure::UnknownNode { node_id } => write!(f, "node {} not found in flow", node_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
    Completed,
    Failed { failure: RunFailure },
    #[serde(rename_all = "camelCase")]
    Terminated { at_node: Option<NodeId> },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Completed => RunStatus::Completed,
            RunOutcome::Failed { .. } => RunStatus::Failed,
            RunOutcome::Terminated { .. } => RunStatus::Terminated,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            RunOutcome::Completed => None,
            RunOutcome::Failed { failure } => Some(failure.to_string()),
            RunOutcome::Terminated { at_node: Some(node) } => {
                Some(format!("run terminated before {}", node))
            }
            RunOutcome::Terminated { at_node: None } => Some("run terminated".to_string()),
        }
    }
}

/// Everything a caller learns about a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub report: ExecutionReport,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::duration_millis(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
