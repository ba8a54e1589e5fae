//! Flow and history stores.
//!
//! The in-memory variants back tests and one-shot CLI runs. The JSON-file
//! variants keep one document per flow under `<dir>/flows/` and a single
//! newest-first history file.

use async_trait::async_trait;
use pipecore::{ExecutionHistoryStore, ExecutionRecord, Flow, FlowId, FlowRepository, StoreError};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Number of run records kept when no limit is configured
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Default)]
pub struct InMemoryFlowRepository {
    flows: RwLock<HashMap<FlowId, Flow>>,
}

impl InMemoryFlowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowRepository for InMemoryFlowRepository {
    async fn get_flow(&self, id: &str) -> Result<Option<Flow>, StoreError> {
        Ok(self.flows.read().await.get(id).cloned())
    }

    async fn save_flow(&self, flow: Flow) -> Result<FlowId, StoreError> {
        let id = flow.id.clone();
        self.flows.write().await.insert(id.clone(), flow);
        Ok(id)
    }

    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError> {
        Ok(self.flows.read().await.values().cloned().collect())
    }

    async fn delete_flow(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.flows.write().await.remove(id).is_some())
    }
}

/// Bounded run history, newest first
pub struct InMemoryHistoryStore {
    records: RwLock<VecDeque<ExecutionRecord>>,
    limit: usize,
}

impl InMemoryHistoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            limit,
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[async_trait]
impl ExecutionHistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: ExecutionRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        records.push_front(record);
        records.truncate(self.limit);
        Ok(true)
    }

    async fn list_by_flow(&self, flow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.flow_id == flow_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.records.read().await.iter().cloned().collect())
    }
}

/// Flow definitions stored as `<dir>/<id>.json`
pub struct JsonFileFlowRepository {
    dir: PathBuf,
}

impl JsonFileFlowRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl FlowRepository for JsonFileFlowRepository {
    async fn get_flow(&self, id: &str) -> Result<Option<Flow>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_flow(&self, flow: Flow) -> Result<FlowId, StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_string_pretty(&flow)?;
        tokio::fs::write(self.path_for(&flow.id), content).await?;
        tracing::debug!("Saved flow {} to {}", flow.id, self.dir.display());
        Ok(flow.id)
    }

    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut flows = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Flow>(&content) {
                Ok(flow) => flows.push(flow),
                Err(e) => tracing::warn!("Skipping unreadable flow file {}: {}", path.display(), e),
            }
        }
        Ok(flows)
    }

    async fn delete_flow(&self, id: &str) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Run history kept in one JSON array, newest first, capped at `limit`
pub struct JsonFileHistoryStore {
    path: PathBuf,
    limit: usize,
    // serializes read-modify-write cycles on the file
    lock: RwLock<()>,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ExecutionHistoryStore for JsonFileHistoryStore {
    async fn append(&self, record: ExecutionRecord) -> Result<bool, StoreError> {
        let _guard = self.lock.write().await;
        let mut records = self.load().await?;
        records.insert(0, record);
        records.truncate(self.limit);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(true)
    }

    async fn list_by_flow(&self, flow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        let _guard = self.lock.read().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|r| r.flow_id == flow_id)
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        let _guard = self.lock.read().await;
        self.load().await
    }
}
