use crate::{FlowId, NodeId, Value};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Run-scoped store of every value consumed or produced so far, keyed by
/// `"{nodeId}.{paramName}"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessResults {
    values: BTreeMap<String, Value>,
}

impl ProcessResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(node_id: &str, param: &str) -> String {
        format!("{}.{}", node_id, param)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_param(&self, node_id: &str, param: &str) -> Option<&Value> {
        self.values.get(&Self::key(node_id, param))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store a value under a fresh key. Keys are write-once: returns `false`
    /// and leaves the stored value alone if the key is already taken.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if self.values.contains_key(&key) {
            tracing::warn!("Refusing to overwrite process result {}", key);
            return false;
        }
        self.values.insert(key, value);
        true
    }

    /// Replace a previously produced value. Only writeback parameters use this.
    pub fn overwrite(&mut self, key: &str, value: Value) -> bool {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.values
    }
}

/// Downloadable file produced by the last node of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub file_name: String,
    /// Base64 encoded content
    pub file_data: String,
    pub content_type: String,
    pub file_size: usize,
}

impl FileRecord {
    pub const DEFAULT_FILE_NAME: &'static str = "downloaded_file.bin";
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/octet-stream";

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            file_name: Self::DEFAULT_FILE_NAME.to_string(),
            file_data: STANDARD.encode(bytes),
            content_type: Self::DEFAULT_CONTENT_TYPE.to_string(),
            file_size: bytes.len(),
        }
    }

    pub fn into_value(self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("fileName".to_string(), Value::String(self.file_name));
        map.insert("fileData".to_string(), Value::String(self.file_data));
        map.insert("contentType".to_string(), Value::String(self.content_type));
        map.insert("fileSize".to_string(), Value::Int(self.file_size as i64));
        Value::Object(map)
    }

    /// Whether `value` already has the shape of a file record.
    pub fn is_file_record(value: &Value) -> bool {
        value
            .as_object()
            .map(|map| map.contains_key("fileData") || map.contains_key("file_data"))
            .unwrap_or(false)
    }
}

/// Outcome summary of one run, handed to the history recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub flow_id: FlowId,
    pub flow_name: String,
    pub final_result: Value,
    pub process_results: ProcessResults,
    pub execution_order: Vec<NodeId>,
    pub total_nodes_executed: usize,
    pub reached_end_node: bool,
}

/// Persisted wrapper around a run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub flow_id: FlowId,
    pub flow_name: String,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub execution_time_seconds: f64,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub result_data: Option<ExecutionReport>,
}
