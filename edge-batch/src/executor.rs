//! Multi-command orchestration, grounded on
//! `original_source/Edge/robot_service/batch/executor.py::BatchExecutor`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use edge_common::{Message, Priority};
use edge_queue::Queue;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::{
    models::{BatchCommand, BatchOptions, BatchResult, BatchSpec, BatchStatus, CommandResult, CommandStatus},
    result_store::{RecordStatus, ResultStore},
};

const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn priority_from_str(value: Option<&str>) -> Priority {
    match value.map(str::to_lowercase).as_deref() {
        Some("low") => Priority::Low,
        Some("high") => Priority::High,
        Some("urgent") => Priority::Urgent,
        _ => Priority::Normal,
    }
}

fn cancelled_result(command: &BatchCommand, now: chrono::DateTime<Utc>) -> CommandResult {
    CommandResult {
        command_id: command.command_id.clone().unwrap_or_default(),
        trace_id: command.trace_id.clone().unwrap_or_default(),
        robot_id: command.robot_id.clone(),
        action: command.action.clone(),
        status: CommandStatus::Cancelled,
        start_time: now,
        end_time: now,
        duration_ms: 0,
        retry_count: 0,
        result_data: None,
        error: Some("Cancelled due to previous error".to_string()),
    }
}

/// Dispatches `BatchSpec`s onto a [`Queue`], polling a [`ResultStore`] for
/// each command's terminal outcome. Cheaply `Clone`: every field is an
/// `Arc`, so grouped/parallel execution can hand each spawned task its own
/// handle.
#[derive(Clone)]
pub struct BatchExecutor {
    queue: Arc<dyn Queue>,
    result_store: Arc<dyn ResultStore>,
    semaphore: Arc<Semaphore>,
}

impl BatchExecutor {
    #[must_use]
    pub fn new(queue: Arc<dyn Queue>, result_store: Arc<dyn ResultStore>, max_parallel: u32) -> Self {
        Self {
            queue,
            result_store,
            semaphore: Arc::new(Semaphore::new(max_parallel.max(1) as usize)),
        }
    }

    #[tracing::instrument(skip(self, spec), fields(batch_id = %spec.batch_id))]
    pub async fn execute_batch(&self, mut spec: BatchSpec, dry_run: bool) -> BatchResult {
        tracing::info!(
            mode = ?spec.options.execution_mode,
            dry_run,
            commands = spec.commands.len(),
            "executing batch"
        );

        for command in &mut spec.commands {
            if command.command_id.is_none() {
                command.command_id = Some(format!("cmd-{}", ulid::Ulid::new()));
            }
            if command.trace_id.is_none() {
                command.trace_id = Some(format!("trace-{}", ulid::Ulid::new()));
            }
        }

        let mut batch_result = BatchResult::new(spec.batch_id.clone(), Utc::now(), spec.metadata.clone());

        let commands = if dry_run {
            self.execute_dry_run(&spec.commands)
        } else {
            match spec.options.execution_mode {
                crate::models::ExecutionMode::Parallel => self.execute_parallel(&spec.commands, &spec.options).await,
                crate::models::ExecutionMode::Sequential => {
                    self.execute_sequential(&spec.commands, &spec.options).await
                }
                crate::models::ExecutionMode::Grouped => self.execute_grouped(&spec.commands, &spec.options).await,
            }
        };

        batch_result.commands = commands;
        batch_result.end_time = Some(Utc::now());
        batch_result.status = BatchStatus::Completed;
        batch_result.update_statistics();

        tracing::info!(
            status = ?batch_result.status,
            successful = batch_result.successful,
            total = batch_result.total_commands,
            "batch completed"
        );

        batch_result
    }

    fn execute_dry_run(&self, commands: &[BatchCommand]) -> Vec<CommandResult> {
        let now = Utc::now();
        commands
            .iter()
            .map(|command| CommandResult {
                command_id: command.command_id.clone().unwrap_or_default(),
                trace_id: command.trace_id.clone().unwrap_or_default(),
                robot_id: command.robot_id.clone(),
                action: command.action.clone(),
                status: CommandStatus::Success,
                start_time: now,
                end_time: now,
                duration_ms: 0,
                retry_count: 0,
                result_data: Some(json!({"dry_run": true})),
                error: None,
            })
            .collect()
    }

    async fn execute_parallel(&self, commands: &[BatchCommand], options: &BatchOptions) -> Vec<CommandResult> {
        let mut handles = Vec::with_capacity(commands.len());
        for command in commands {
            let command = command.clone();
            let options = options.clone();
            let executor = self.clone();
            let semaphore = Arc::clone(&self.semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                executor.single_command_with_retry(&command, &options).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (handle, command) in handles.into_iter().zip(commands) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_err) => {
                    tracing::error!(%join_err, "batch task panicked");
                    let now = Utc::now();
                    results.push(CommandResult {
                        command_id: command.command_id.clone().unwrap_or_default(),
                        trace_id: command.trace_id.clone().unwrap_or_default(),
                        robot_id: command.robot_id.clone(),
                        action: command.action.clone(),
                        status: CommandStatus::Failed,
                        start_time: now,
                        end_time: now,
                        duration_ms: 0,
                        retry_count: 0,
                        result_data: None,
                        error: Some(join_err.to_string()),
                    });
                }
            }
        }
        results
    }

    async fn execute_sequential(&self, commands: &[BatchCommand], options: &BatchOptions) -> Vec<CommandResult> {
        let mut results: Vec<CommandResult> = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self.single_command_with_retry(command, options).await;
            let stop = options.stop_on_error && matches!(result.status, CommandStatus::Failed | CommandStatus::Timeout);
            results.push(result);

            if stop {
                tracing::warn!(command_id = %commands[results.len() - 1].command_id.as_deref().unwrap_or_default(), "stopping batch due to error");
                let now = Utc::now();
                for remaining in &commands[results.len()..] {
                    results.push(cancelled_result(remaining, now));
                }
                break;
            }

            if options.delay_between_commands_ms > 0 {
                tokio::time::sleep(Duration::from_millis(options.delay_between_commands_ms)).await;
            }
        }

        results
    }

    /// Partition by `robot_id` preserving first-seen order, run each group
    /// sequentially, run groups concurrently, then restore the original
    /// input order by the positional index captured here -- not by
    /// `command_id`, which may not be unique or ordered once reassigned.
    async fn execute_grouped(&self, commands: &[BatchCommand], options: &BatchOptions) -> Vec<CommandResult> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<(usize, BatchCommand)>> = HashMap::new();

        for (index, command) in commands.iter().enumerate() {
            groups
                .entry(command.robot_id.clone())
                .or_insert_with(|| {
                    order.push(command.robot_id.clone());
                    Vec::new()
                })
                .push((index, command.clone()));
        }

        tracing::info!(groups = order.len(), "grouped into robot groups");

        let mut handles = Vec::with_capacity(order.len());
        for robot_id in &order {
            let Some(group) = groups.remove(robot_id) else { continue };
            let executor = self.clone();
            let options = options.clone();
            handles.push(tokio::spawn(async move {
                let (indices, group_commands): (Vec<usize>, Vec<BatchCommand>) = group.into_iter().unzip();
                let results = executor.execute_sequential(&group_commands, &options).await;
                indices.into_iter().zip(results).collect::<Vec<_>>()
            }));
        }

        let mut indexed: Vec<(usize, CommandResult)> = Vec::with_capacity(commands.len());
        for handle in handles {
            match handle.await {
                Ok(pairs) => indexed.extend(pairs),
                Err(join_err) => tracing::error!(%join_err, "batch group task panicked"),
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    async fn single_command_with_retry(&self, command: &BatchCommand, options: &BatchOptions) -> CommandResult {
        let start_time = Utc::now();
        let mut retry_count = 0u32;
        let mut last_error: Option<String> = None;

        for attempt in 0..=options.retry_on_failure {
            let result = self.dispatch_command(command).await;
            if result.status == CommandStatus::Success {
                let mut result = result;
                result.retry_count = retry_count;
                return result;
            }
            last_error = result.error;

            if attempt < options.retry_on_failure {
                retry_count += 1;
                let delay = options.retry_backoff_factor.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
                tracing::info!(
                    command_id = %command.command_id.as_deref().unwrap_or_default(),
                    delay,
                    attempt = attempt + 2,
                    "retrying command"
                );
                tokio::time::sleep(Duration::from_secs_f64(delay.max(0.0))).await;
            }
        }

        CommandResult {
            command_id: command.command_id.clone().unwrap_or_default(),
            trace_id: command.trace_id.clone().unwrap_or_default(),
            robot_id: command.robot_id.clone(),
            action: command.action.clone(),
            status: CommandStatus::Failed,
            start_time,
            end_time: Utc::now(),
            duration_ms: 0,
            retry_count,
            result_data: None,
            error: Some(last_error.unwrap_or_else(|| "Command failed after retries".to_string())),
        }
    }

    async fn dispatch_command(&self, command: &BatchCommand) -> CommandResult {
        let start_time = Utc::now();
        let command_id = command.command_id.clone().unwrap_or_default();
        let trace_id = command.trace_id.clone().unwrap_or_default();

        let mut payload = HashMap::new();
        payload.insert("robot_id".to_string(), json!(command.robot_id));
        payload.insert("action".to_string(), json!(command.action));
        payload.insert("params".to_string(), json!(command.params));

        let priority = priority_from_str(command.priority.as_deref());
        let mut message = Message::new(payload, priority);
        message.id.clone_from(&command_id);
        message = message.with_trace(Some(trace_id.clone()), None);

        if let Err(err) = self.queue.enqueue(message).await {
            tracing::error!(command_id = %command_id, %err, "error dispatching command");
            return CommandResult {
                command_id,
                trace_id,
                robot_id: command.robot_id.clone(),
                action: command.action.clone(),
                status: CommandStatus::Failed,
                start_time,
                end_time: Utc::now(),
                duration_ms: 0,
                retry_count: 0,
                result_data: None,
                error: Some(err.to_string()),
            };
        }

        let timeout = Duration::from_millis(command.timeout_ms);
        match tokio::time::timeout(timeout, self.wait_for_result(&command_id)).await {
            Ok(record) => {
                let end_time = Utc::now();
                let duration_ms = (end_time - start_time).num_milliseconds();
                match record.status {
                    RecordStatus::Completed => CommandResult {
                        command_id,
                        trace_id,
                        robot_id: command.robot_id.clone(),
                        action: command.action.clone(),
                        status: CommandStatus::Success,
                        start_time,
                        end_time,
                        duration_ms,
                        retry_count: 0,
                        result_data: record.data,
                        error: None,
                    },
                    RecordStatus::Failed => CommandResult {
                        command_id,
                        trace_id,
                        robot_id: command.robot_id.clone(),
                        action: command.action.clone(),
                        status: CommandStatus::Failed,
                        start_time,
                        end_time,
                        duration_ms,
                        retry_count: 0,
                        result_data: None,
                        error: record.error,
                    },
                }
            }
            Err(_) => CommandResult {
                command_id,
                trace_id,
                robot_id: command.robot_id.clone(),
                action: command.action.clone(),
                status: CommandStatus::Timeout,
                start_time,
                end_time: Utc::now(),
                duration_ms: 0,
                retry_count: 0,
                result_data: None,
                error: Some(format!("Command timeout after {}ms", command.timeout_ms)),
            },
        }
    }

    async fn wait_for_result(&self, command_id: &str) -> crate::result_store::ResultRecord {
        loop {
            if let Some(record) = self.result_store.get_result(command_id).await {
                return record;
            }
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
        }
    }

    /// Proxies the underlying queue's health, so a `ManagedService` wrapper
    /// (see `edge-coordinator`) can register this executor like any other
    /// subsystem.
    pub async fn health_check(&self) -> crate::Result<edge_queue::HealthReport> {
        Ok(self.queue.health_check().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use edge_queue::MemoryQueue;

    use super::*;
    use crate::{
        models::ExecutionMode,
        result_store::{InMemoryResultStore, ResultRecord},
    };

    fn command(robot_id: &str, action: &str) -> BatchCommand {
        BatchCommand {
            command_id: None,
            trace_id: None,
            robot_id: robot_id.to_string(),
            action: action.to_string(),
            params: StdHashMap::new(),
            priority: None,
            timeout_ms: 500,
        }
    }

    fn spec(commands: Vec<BatchCommand>, mode: ExecutionMode) -> BatchSpec {
        BatchSpec {
            batch_id: "batch-1".to_string(),
            commands,
            options: BatchOptions {
                execution_mode: mode,
                ..BatchOptions::default()
            },
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn dry_run_never_touches_the_queue() {
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::default());
        let store = Arc::new(InMemoryResultStore::new());
        let executor = BatchExecutor::new(Arc::clone(&queue), store, 4);

        let result = executor
            .execute_batch(spec(vec![command("r1", "move")], ExecutionMode::Sequential), true)
            .await;

        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.commands[0].status, CommandStatus::Success);
        assert_eq!(queue.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sequential_stop_on_error_cancels_the_rest() {
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::default());
        let store = Arc::new(InMemoryResultStore::new());
        let executor = BatchExecutor::new(Arc::clone(&queue), store, 4);

        let mut batch_spec = spec(
            vec![command("r1", "fail-me"), command("r1", "never-runs")],
            ExecutionMode::Sequential,
        );
        batch_spec.options.stop_on_error = true;
        batch_spec.commands[0].timeout_ms = 50;

        let result = executor.execute_batch(batch_spec, false).await;

        assert_eq!(result.commands.len(), 2);
        assert_eq!(result.commands[0].status, CommandStatus::Timeout);
        assert_eq!(result.commands[1].status, CommandStatus::Cancelled);
    }

    #[tokio::test]
    async fn grouped_execution_restores_original_order_across_robots() {
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::default());
        let store = Arc::new(InMemoryResultStore::new());
        let executor = BatchExecutor::new(Arc::clone(&queue), Arc::clone(&store), 4);

        let commands = vec![command("r1", "a"), command("r2", "b"), command("r1", "c")];
        let batch_spec = spec(commands, ExecutionMode::Grouped);

        // Every command's enqueue is immediately "completed" by a background
        // watcher so dispatch resolves without a real worker.
        let watch_store = Arc::clone(&store);
        let watch_queue = Arc::clone(&queue);
        tokio::spawn(async move {
            loop {
                if let Ok(Some(message)) = watch_queue.dequeue(Some(Duration::from_millis(20))).await {
                    watch_store.record_result(&message.id, ResultRecord::completed(json!({})));
                    let _ = watch_queue.ack(&message.id).await;
                }
            }
        });

        let result = executor.execute_batch(batch_spec, false).await;

        let actions: Vec<&str> = result.commands.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["a", "b", "c"]);
        assert!(result.commands.iter().all(|r| r.status == CommandStatus::Success));
    }
}
