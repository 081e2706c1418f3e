//! Batch request/response shapes. Grounded on
//! `original_source/Edge/robot_service/batch/executor.py`'s use of
//! `BatchSpec`/`BatchCommand`/`BatchOptions`/`BatchResult`/`CommandResult`
//! (the `models.py` defining these was not included in the retrieval pack,
//! so the fields below are reconstructed from how `executor.py` constructs
//! and reads them).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Parallel,
    Sequential,
    Grouped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Failed,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

fn default_retry_backoff_factor() -> f64 {
    2.0
}

/// Execution knobs, grounded on `executor.py`'s `BatchOptions` usage
/// (`execution_mode`, `stop_on_error`, `retry_on_failure`,
/// `retry_backoff_factor`, `delay_between_commands_ms`). `max_parallel` is
/// a [`crate::BatchExecutor`] constructor setting, not a per-batch option,
/// matching `BatchExecutor.__init__`'s `max_parallel` rather than
/// `BatchOptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    #[serde(default = "default_execution_mode")]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default)]
    pub retry_on_failure: u32,
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,
    #[serde(default)]
    pub delay_between_commands_ms: u64,
}

const fn default_execution_mode() -> ExecutionMode {
    ExecutionMode::Sequential
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            execution_mode: default_execution_mode(),
            stop_on_error: false,
            retry_on_failure: 0,
            retry_backoff_factor: default_retry_backoff_factor(),
            delay_between_commands_ms: 0,
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// One command within a batch. `command_id`/`trace_id` are stamped at
/// ingestion if absent, grounded on `execute_batch`'s
/// `cmd-{uuid4().hex[:8]}` / `trace-{uuid4().hex[:12]}` generation (here
/// using ULIDs, matching `edge_common::Message::id`'s convention instead
/// of hex-truncated UUIDs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCommand {
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    pub robot_id: String,
    pub action: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSpec {
    pub batch_id: String,
    pub commands: Vec<BatchCommand>,
    #[serde(default)]
    pub options: BatchOptions,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub command_id: String,
    pub trace_id: String,
    pub robot_id: String,
    pub action: String,
    pub status: CommandStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub result_data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commands: Vec<CommandResult>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub total_commands: u32,
    #[serde(default)]
    pub successful: u32,
    #[serde(default)]
    pub failed: u32,
}

impl BatchResult {
    #[must_use]
    pub fn new(batch_id: String, start_time: DateTime<Utc>, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            batch_id,
            status: BatchStatus::Running,
            start_time,
            end_time: None,
            commands: Vec::new(),
            metadata,
            total_commands: 0,
            successful: 0,
            failed: 0,
        }
    }

    /// Recompute `total_commands`/`successful`/`failed` from `commands`,
    /// grounded on `BatchResult.update_statistics`.
    pub fn update_statistics(&mut self) {
        self.total_commands = u32::try_from(self.commands.len()).unwrap_or(u32::MAX);
        self.successful = u32::try_from(
            self.commands
                .iter()
                .filter(|c| c.status == CommandStatus::Success)
                .count(),
        )
        .unwrap_or(u32::MAX);
        self.failed = self.total_commands.saturating_sub(self.successful);
    }
}
