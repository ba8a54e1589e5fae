use crate::{FlowId, NodeId, RunStatus, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Progress of one flow run, as seen by subscribers of the [`EventBus`].
///
/// A run always opens with `FlowStarted` and closes with `FlowFinished`;
/// everything in between carries the same `run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    FlowStarted {
        run_id: RunId,
        flow_id: FlowId,
        start_node: NodeId,
        timestamp: DateTime<Utc>,
    },
    FlowFinished {
        run_id: RunId,
        flow_id: FlowId,
        status: RunStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        run_id: RunId,
        node_id: NodeId,
        instruction_id: String,
        timestamp: DateTime<Utc>,
    },
    /// `output` is `None` when the instruction declares no output parameter
    NodeCompleted {
        run_id: RunId,
        node_id: NodeId,
        output: Option<Value>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        run_id: RunId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The branch chosen after `source` finished
    EdgeTaken {
        run_id: RunId,
        source: NodeId,
        target: NodeId,
        guard: Option<String>,
        timestamp: DateTime<Utc>,
    },
    NodeEvent {
        run_id: RunId,
        node_id: NodeId,
        event: NodeEvent,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            ExecutionEvent::FlowStarted { run_id, .. }
            | ExecutionEvent::FlowFinished { run_id, .. }
            | ExecutionEvent::NodeStarted { run_id, .. }
            | ExecutionEvent::NodeCompleted { run_id, .. }
            | ExecutionEvent::NodeFailed { run_id, .. }
            | ExecutionEvent::EdgeTaken { run_id, .. }
            | ExecutionEvent::NodeEvent { run_id, .. } => *run_id,
        }
    }

    /// Short snake_case name, handy for logs and assertions
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionEvent::FlowStarted { .. } => "flow_started",
            ExecutionEvent::FlowFinished { .. } => "flow_finished",
            ExecutionEvent::NodeStarted { .. } => "node_started",
            ExecutionEvent::NodeCompleted { .. } => "node_completed",
            ExecutionEvent::NodeFailed { .. } => "node_failed",
            ExecutionEvent::EdgeTaken { .. } => "edge_taken",
            ExecutionEvent::NodeEvent { .. } => "node_event",
        }
    }
}

/// What a task reports about itself while it runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum NodeEvent {
    Info { message: String },
    Warning { message: String },
    Progress { percent: f64, message: Option<String> },
}

/// Sender bound to one node of one run. Tasks get it through
/// `TaskContext::events`; sends with no subscriber are dropped.
#[derive(Clone)]
pub struct EventEmitter {
    run_id: RunId,
    node_id: NodeId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: NodeEvent) {
        let _ = self.sender.send(ExecutionEvent::NodeEvent {
            run_id: self.run_id,
            node_id: self.node_id.clone(),
            event,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Info {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Warning {
            message: message.into(),
        });
    }

    /// `percent` is passed through as given, 0 to 100 by convention
    pub fn progress(&self, percent: f64, message: Option<String>) {
        self.emit(NodeEvent::Progress { percent, message });
    }
}

/// One broadcast channel per runtime. Slow subscribers lag rather than
/// block the executor.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, run_id: RunId, node_id: NodeId) -> EventEmitter {
        EventEmitter {
            run_id,
            node_id,
            sender: self.sender.clone(),
        }
    }
}
