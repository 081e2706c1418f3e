//! Implements `edge_control::server::CommandHandler`, dispatching admin
//! requests onto the running queue, coordinator, and offline buffer.
//!
//! One handler struct holds `Arc`s to the subsystems it administers; one
//! `async fn handle_request` matches on `RequestCommand` and dispatches to
//! per-domain private helper methods.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use edge_control::{
    protocol::{
        CoordinatorCommand, OfflineCommand, OfflineStats, QueueCommand, QueueMessageSummary, QueueStats,
        RequestCommand, ServiceSummary, SystemCommand, SystemStatus,
    },
    server::CommandHandler,
    ControlError, Request, Response, ResponseData, Result,
};
use edge_coordinator::ServiceCoordinator;
use edge_offline::OfflineBufferService;
use edge_queue::Queue;

use crate::ingress::CommandIngress;

/// Handles control requests against the live queue, coordinator, and
/// offline buffer.
pub struct EdgeControlHandler {
    queue: Arc<dyn Queue>,
    coordinator: Arc<ServiceCoordinator>,
    offline: Arc<OfflineBufferService>,
    ingress: Arc<CommandIngress>,
    start_time: Instant,
}

impl EdgeControlHandler {
    #[must_use]
    pub fn new(
        queue: Arc<dyn Queue>,
        coordinator: Arc<ServiceCoordinator>,
        offline: Arc<OfflineBufferService>,
        ingress: Arc<CommandIngress>,
    ) -> Self {
        Self {
            queue,
            coordinator,
            offline,
            ingress,
            start_time: Instant::now(),
        }
    }

    async fn handle_system_command(&self, command: &SystemCommand) -> Result<Response> {
        match command {
            SystemCommand::Ping => Ok(Response::ok()),
            SystemCommand::Status => {
                let queue_size = self
                    .queue
                    .size()
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                let service_count = self.coordinator.get_services_status().await.len();
                Ok(Response::data(ResponseData::SystemStatus(SystemStatus {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    uptime_secs: self.start_time.elapsed().as_secs(),
                    queue_size,
                    service_count,
                })))
            }
        }
    }

    async fn handle_queue_command(&self, command: QueueCommand) -> Result<Response> {
        match command {
            QueueCommand::Peek => {
                let message = self
                    .queue
                    .peek()
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::QueueMessage(message.map(|m| {
                    QueueMessageSummary {
                        id: m.id,
                        priority: format!("{:?}", m.priority).to_uppercase(),
                        timestamp: m.timestamp.to_rfc3339(),
                        retry_count: m.retry_count,
                        trace_id: m.trace_id,
                    }
                }))))
            }
            QueueCommand::Ack { message_id } => {
                let acked = self
                    .queue
                    .ack(&message_id)
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::Message(format!(
                    "message {message_id} {}",
                    if acked { "acked" } else { "not found" }
                ))))
            }
            QueueCommand::Nack { message_id, requeue } => {
                let nacked = self
                    .queue
                    .nack(&message_id, requeue)
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::Message(format!(
                    "message {message_id} {}",
                    if nacked { "nacked" } else { "not found" }
                ))))
            }
            QueueCommand::Clear => {
                self.queue
                    .clear()
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::Message("queue cleared".to_string())))
            }
            QueueCommand::Stats => {
                let size = self
                    .queue
                    .size()
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                let health = self
                    .queue
                    .health_check()
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::QueueStats(QueueStats {
                    size,
                    health_status: health.status,
                    backend: health.backend.to_string(),
                })))
            }
            QueueCommand::Submit {
                payload,
                priority,
                trace_id,
                correlation_id,
            } => {
                let message_id = self
                    .ingress
                    .submit_command(payload, priority, trace_id, correlation_id)
                    .await;
                Ok(Response::data(ResponseData::Message(match message_id {
                    Some(id) => format!("command submitted: {id}"),
                    None => "failed to submit command".to_string(),
                })))
            }
        }
    }

    async fn handle_coordinator_command(&self, command: CoordinatorCommand) -> Result<Response> {
        match command {
            CoordinatorCommand::ListServices => {
                let states = self.coordinator.get_services_status().await;
                let summaries = states
                    .into_iter()
                    .map(|(name, state)| {
                        (
                            name,
                            ServiceSummary {
                                status: format!("{:?}", state.status).to_lowercase(),
                                restart_attempts: state.restart_attempts,
                                consecutive_failures: state.consecutive_failures,
                                last_error: state.last_error,
                            },
                        )
                    })
                    .collect();
                Ok(Response::data(ResponseData::ServiceStates(summaries)))
            }
            CoordinatorCommand::StartService { name } => {
                let started = self
                    .coordinator
                    .start_service(&name)
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::Message(format!(
                    "service {name} {}",
                    if started { "started" } else { "declined to start" }
                ))))
            }
            CoordinatorCommand::StopService { name } => {
                let stopped = self
                    .coordinator
                    .stop_service(&name, None)
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::Message(format!(
                    "service {name} {}",
                    if stopped { "stopped" } else { "was not running" }
                ))))
            }
            CoordinatorCommand::HealthCheck => {
                let health = self.coordinator.health_check().await;
                Ok(Response::data(ResponseData::CoordinatorHealth(health.status)))
            }
        }
    }

    async fn handle_offline_command(&self, command: OfflineCommand) -> Result<Response> {
        match command {
            OfflineCommand::Flush => {
                self.offline
                    .command_buffer()
                    .flush()
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::Message("offline buffer flushed".to_string())))
            }
            OfflineCommand::Stats => {
                let stats = self
                    .offline
                    .command_buffer()
                    .get_statistics()
                    .await
                    .map_err(|e| ControlError::ServerError(e.to_string()))?;
                Ok(Response::data(ResponseData::OfflineStats(OfflineStats {
                    pending: usize::try_from(stats.pending).unwrap_or(0),
                    failed: usize::try_from(stats.failed).unwrap_or(0),
                })))
            }
        }
    }
}

#[async_trait]
impl CommandHandler for EdgeControlHandler {
    async fn handle_request(&self, request: Request) -> Result<Response> {
        if !request.is_version_compatible() {
            return Err(ControlError::ServerError(format!(
                "incompatible protocol version: client={}, server={}",
                request.version,
                edge_control::PROTOCOL_VERSION
            )));
        }

        match request.command {
            RequestCommand::System(cmd) => self.handle_system_command(&cmd).await,
            RequestCommand::Queue(cmd) => self.handle_queue_command(cmd).await,
            RequestCommand::Coordinator(cmd) => self.handle_coordinator_command(cmd).await,
            RequestCommand::Offline(cmd) => self.handle_offline_command(cmd).await,
        }
    }
}
