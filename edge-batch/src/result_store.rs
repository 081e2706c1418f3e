//! The shared store a [`crate::executor::BatchExecutor`] polls for a
//! dispatched command's terminal outcome, grounded on
//! `_wait_for_result`'s `state_manager.state_store.get(f"command:{id}:result")`
//! poll loop. Whatever ultimately processes a command (an
//! `edge_worker::CommandHandler`) is expected to call
//! [`ResultStore::record_result`] once it reaches a terminal state.

use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub status: RecordStatus,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ResultRecord {
    #[must_use]
    pub fn completed(data: serde_json::Value) -> Self {
        Self {
            status: RecordStatus::Completed,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Failed,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get_result(&self, command_id: &str) -> Option<ResultRecord>;
}

/// In-process store keyed by `command:{id}:result`, matching the key shape
/// the Python source polls even though the Rust side never needs the
/// string prefix for routing -- kept for parity with external tooling that
/// might inspect the same key convention in a shared store.
#[derive(Default)]
pub struct InMemoryResultStore {
    records: DashMap<String, ResultRecord>,
}

impl InMemoryResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_result(&self, command_id: &str, record: ResultRecord) {
        self.records.insert(command_id.to_string(), record);
    }

    pub fn clear(&self, command_id: &str) {
        self.records.remove(command_id);
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn get_result(&self, command_id: &str) -> Option<ResultRecord> {
        self.records.get(command_id).map(|entry| entry.value().clone())
    }
}
