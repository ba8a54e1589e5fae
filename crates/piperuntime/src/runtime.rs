use crate::registry::InstructionRegistry;
use crate::status::RunStatusBoard;
use crate::store::{
    InMemoryFlowRepository, InMemoryHistoryStore, JsonFileFlowRepository, JsonFileHistoryStore,
    DEFAULT_HISTORY_LIMIT,
};
use crate::validate::{upstream_variables, validate_flow, UpstreamNode};
use crate::FlowExecutor;
use chrono::Utc;
use pipecore::{
    EventBus, ExecutionEvent, ExecutionHistoryStore, ExecutionRecord, Flow, FlowDefError,
    FlowError, FlowId, FlowRepository, RunReport, RunStatus,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main runtime: validates, runs and records flows
pub struct FlowRuntime {
    registry: Arc<InstructionRegistry>,
    flows: Arc<dyn FlowRepository>,
    history: Arc<dyn ExecutionHistoryStore>,
    event_bus: Arc<EventBus>,
    status: RunStatusBoard,
}

impl FlowRuntime {
    /// Runtime with no instructions and in-memory stores
    pub fn new() -> Self {
        Self::with_registry(Arc::new(InstructionRegistry::new()), RuntimeConfig::default())
    }

    /// Create a runtime with a pre-populated registry. Stores live under
    /// `config.data_dir` when set, in memory otherwise.
    pub fn with_registry(registry: Arc<InstructionRegistry>, config: RuntimeConfig) -> Self {
        let (flows, history): (Arc<dyn FlowRepository>, Arc<dyn ExecutionHistoryStore>) =
            match &config.data_dir {
                Some(dir) => (
                    Arc::new(JsonFileFlowRepository::new(dir.join("flows"))),
                    Arc::new(JsonFileHistoryStore::new(
                        dir.join("history.json"),
                        config.history_limit,
                    )),
                ),
                None => (
                    Arc::new(InMemoryFlowRepository::new()),
                    Arc::new(InMemoryHistoryStore::new(config.history_limit)),
                ),
            };
        Self::with_stores(registry, flows, history, config)
    }

    pub fn with_stores(
        registry: Arc<InstructionRegistry>,
        flows: Arc<dyn FlowRepository>,
        history: Arc<dyn ExecutionHistoryStore>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            registry,
            flows,
            history,
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            status: RunStatusBoard::new(),
        }
    }

    pub fn registry(&self) -> &Arc<InstructionRegistry> {
        &self.registry
    }

    /// Validate and run `flow`, then record the run in the history store.
    ///
    /// Definition problems come back as `Err`; everything that happens once
    /// the run has started, including node failures and termination, is
    /// reported through the returned `RunReport`.
    pub async fn execute_flow(&self, flow: &Flow) -> Result<RunReport, FlowError> {
        let plan = match validate_flow(flow, self.registry.as_ref()) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!("Flow {} failed validation: {}", flow.id, e);
                self.record(ExecutionRecord {
                    id: Uuid::new_v4(),
                    flow_id: flow.id.clone(),
                    flow_name: flow.name.clone(),
                    success: false,
                    error_message: Some(e.to_string()),
                    execution_time_seconds: 0.0,
                    executed_at: Utc::now(),
                    result_data: None,
                })
                .await;
                if !self.status.reject(&flow.id).await {
                    tracing::warn!("Flow {} is still running, status left unchanged", flow.id);
                }
                return Err(e.into());
            }
        };

        let ctx = self
            .status
            .begin(&flow.id)
            .await
            .ok_or_else(|| FlowError::Execution(format!("Flow {} is already running", flow.id)))?;

        let started = Instant::now();
        let executor = FlowExecutor::new(self.registry.as_ref(), &self.event_bus);
        let run = executor
            .execute(flow, &plan.start, &plan.end_nodes, &ctx)
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        self.record(ExecutionRecord {
            id: Uuid::new_v4(),
            flow_id: flow.id.clone(),
            flow_name: flow.name.clone(),
            success: run.outcome.is_success(),
            error_message: run.outcome.error_message(),
            execution_time_seconds: (elapsed * 1000.0).round() / 1000.0,
            executed_at: Utc::now(),
            result_data: Some(run.report.clone()),
        })
        .await;
        self.status.finish(&flow.id, run.outcome.status()).await;

        Ok(run)
    }

    /// Load a stored flow and run it
    pub async fn execute_flow_by_id(&self, flow_id: &str) -> Result<RunReport, FlowError> {
        let flow = self
            .flows
            .get_flow(flow_id)
            .await?
            .ok_or_else(|| FlowDefError::NotFound(flow_id.to_string()))?;
        self.execute_flow(&flow).await
    }

    /// Failing to record history never fails the run itself.
    async fn record(&self, record: ExecutionRecord) {
        if let Err(e) = self.history.append(record).await {
            tracing::error!("Failed to record run history: {}", e);
        }
    }

    /// Store a flow, assigning an id when it has none
    pub async fn save_flow(&self, mut flow: Flow) -> Result<FlowId, FlowError> {
        let now = Utc::now();
        match self.flows.get_flow(&flow.id).await? {
            Some(existing) if !flow.id.is_empty() => flow.created_at = existing.created_at,
            _ => {
                if flow.id.is_empty() {
                    flow.id = Uuid::new_v4().to_string();
                }
                flow.created_at = now;
            }
        }
        flow.updated_at = now;
        tracing::info!("Saving flow {} ({})", flow.id, flow.name);
        Ok(self.flows.save_flow(flow).await?)
    }

    pub async fn get_flow(&self, flow_id: &str) -> Result<Option<Flow>, FlowError> {
        Ok(self.flows.get_flow(flow_id).await?)
    }

    /// All stored flows, most recently updated first
    pub async fn list_flows(&self) -> Result<Vec<Flow>, FlowError> {
        let mut flows = self.flows.list_flows().await?;
        flows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(flows)
    }

    pub async fn delete_flow(&self, flow_id: &str) -> Result<bool, FlowError> {
        Ok(self.flows.delete_flow(flow_id).await?)
    }

    /// Run history, newest first, optionally for one flow only
    pub async fn history(&self, flow_id: Option<&str>) -> Result<Vec<ExecutionRecord>, FlowError> {
        let records = match flow_id {
            Some(id) => self.history.list_by_flow(id).await?,
            None => self.history.list_all().await?,
        };
        Ok(records)
    }

    /// Request termination of a running flow. Returns `false` if it is not
    /// running.
    pub async fn terminate(&self, flow_id: &str) -> bool {
        self.status.request_terminate(flow_id).await
    }

    pub async fn status(&self, flow_id: &str) -> RunStatus {
        self.status.status(flow_id).await
    }

    pub async fn statuses(&self) -> HashMap<FlowId, RunStatus> {
        self.status.all().await
    }

    /// Variables that nodes upstream of `node_id` expose to it
    pub async fn upstream_variables(
        &self,
        flow_id: &str,
        node_id: &str,
    ) -> Result<Vec<UpstreamNode>, FlowError> {
        let flow = self
            .flows
            .get_flow(flow_id)
            .await?
            .ok_or_else(|| FlowDefError::NotFound(flow_id.to_string()))?;
        Ok(upstream_variables(&flow, node_id, self.registry.as_ref())?)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    /// Maximum number of run records kept in the history
    pub history_limit: usize,
    /// Directory for flow and history files; in-memory stores when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            history_limit: DEFAULT_HISTORY_LIMIT,
            data_dir: None,
        }
    }
}

impl RuntimeConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self, FlowError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
