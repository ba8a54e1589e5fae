use pipecore::{FlowId, RunContext, RunStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

struct Entry {
    status: RunStatus,
    cancellation: Option<CancellationToken>,
}

/// Per-flow run status with out-of-band termination requests.
///
/// Each running flow owns the cancellation token of its `RunContext`;
/// requesting termination cancels that token.
#[derive(Default)]
pub struct RunStatusBoard {
    entries: RwLock<HashMap<FlowId, Entry>>,
}

impl RunStatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `flow_id` as running and hand out the context for its run.
    /// Returns `None` while a previous run of the same flow is still going.
    pub async fn begin(&self, flow_id: &str) -> Option<RunContext> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(flow_id) {
            if entry.status == RunStatus::Running {
                return None;
            }
        }
        let ctx = RunContext::new(flow_id);
        entries.insert(
            flow_id.to_string(),
            Entry {
                status: RunStatus::Running,
                cancellation: Some(ctx.cancellation.clone()),
            },
        );
        Some(ctx)
    }

    pub async fn finish(&self, flow_id: &str, status: RunStatus) {
        let mut entries = self.entries.write().await;
        entries.insert(
            flow_id.to_string(),
            Entry {
                status,
                cancellation: None,
            },
        );
    }

    /// Record a run that was refused before it started. A run of the same
    /// flow that is still going keeps its entry and its token.
    pub async fn reject(&self, flow_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(flow_id) {
            if entry.status == RunStatus::Running {
                return false;
            }
        }
        entries.insert(
            flow_id.to_string(),
            Entry {
                status: RunStatus::Failed,
                cancellation: None,
            },
        );
        true
    }

    /// Ask the running flow to stop. Returns `false` if it is not running.
    pub async fn request_terminate(&self, flow_id: &str) -> bool {
        let entries = self.entries.read().await;
        match entries.get(flow_id).and_then(|e| e.cancellation.as_ref()) {
            Some(token) => {
                tracing::info!("Termination requested for flow {}", flow_id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn status(&self, flow_id: &str) -> RunStatus {
        self.entries
            .read()
            .await
            .get(flow_id)
            .map(|e| e.status)
            .unwrap_or(RunStatus::Idle)
    }

    pub async fn all(&self) -> HashMap<FlowId, RunStatus> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, e)| (id.clone(), e.status))
            .collect()
    }
}
