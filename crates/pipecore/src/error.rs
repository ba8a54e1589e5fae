use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowDefError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised while preparing or dispatching task logic for one node.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("No callable found in task body")]
    NoCallable,

    #[error("No signature match for parameters {requested:?}")]
    NoSignatureMatch { requested: Vec<String> },

    #[error("Callable '{callable}' failed: {message}")]
    Invocation { callable: String, message: String },

    #[error("Instruction not found: {0}")]
    InstructionNotFound(String),

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Structural problems in a flow definition, reported before execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowDefError {
    #[error("Flow not found: {0}")]
    NotFound(String),

    #[error("Flow has no nodes")]
    Empty,

    #[error("Node {0} is connected to itself")]
    SelfLoop(String),

    #[error("Duplicate connection: {from} -> {to}")]
    DuplicateEdge { from: String, to: String },

    #[error("Edge {edge_id} references unknown node {node_id}")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("Flow must contain a start node (a node without incoming edges)")]
    NoStartNode,

    #[error("Flow can only have one start node, found {0:?}")]
    MultipleStartNodes(Vec<String>),

    #[error("Flow must contain an end node (a node without outgoing edges)")]
    NoEndNode,

    #[error("Start node {0} must have an outgoing edge")]
    StartWithoutOutgoing(String),

    #[error("End node {0} must have an incoming edge")]
    EndWithoutIncoming(String),

    #[error("Isolated nodes: {0:?}")]
    IsolatedNodes(Vec<String>),

    #[error("No path from the start node to any end node")]
    NoPathToEnd,

    #[error("Node {node_id} references unknown instruction {instruction_id}")]
    UnknownInstruction {
        node_id: String,
        instruction_id: String,
    },

    #[error("Node {node_id} is missing required parameter '{param}'")]
    MissingRequiredParam { node_id: String, param: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
