use crate::{ExecutionRecord, Flow, FlowId, StoreError};
use async_trait::async_trait;

/// Persistence contract for flow definitions
#[async_trait]
pub trait FlowRepository: Send + Sync {
    async fn get_flow(&self, id: &str) -> Result<Option<Flow>, StoreError>;

    /// Insert or replace a flow, returning its id.
    async fn save_flow(&self, flow: Flow) -> Result<FlowId, StoreError>;

    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError>;

    /// Returns `false` if no flow with that id existed.
    async fn delete_flow(&self, id: &str) -> Result<bool, StoreError>;
}

/// Append-only sink for run records
#[async_trait]
pub trait ExecutionHistoryStore: Send + Sync {
    async fn append(&self, record: ExecutionRecord) -> Result<bool, StoreError>;

    async fn list_by_flow(&self, flow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError>;

    async fn list_all(&self) -> Result<Vec<ExecutionRecord>, StoreError>;
}
