//! Control protocol types and serialization

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Current protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Request sent to the control server (versioned wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version
    pub version: u32,
    /// Bearer token, required when the server has `ControlAuthConfig::enabled`
    #[serde(default)]
    pub token: Option<String>,
    /// The actual command to execute
    pub command: RequestCommand,
}

/// Request command types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestCommand {
    /// System management commands
    System(SystemCommand),
    /// Queue management commands
    Queue(QueueCommand),
    /// Coordinator management commands
    Coordinator(CoordinatorCommand),
    /// Offline buffer management commands
    Offline(OfflineCommand),
}

/// System management commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemCommand {
    /// Health check / ping
    Ping,
    /// Get system status and statistics
    Status,
}

/// Queue management commands. Mirrors `edge_queue::Queue`'s actual surface:
/// the queue has no "view by id"/"delete by id" operation, so the admin
/// protocol does not invent one either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueueCommand {
    /// Non-destructively inspect the next message, if any
    Peek,
    /// Acknowledge successful processing of an in-flight message
    Ack {
        /// Message id to ack
        message_id: String,
    },
    /// Report a failed message, optionally requeuing it
    Nack {
        /// Message id to nack
        message_id: String,
        /// Whether the message should be requeued (if its retry budget allows)
        requeue: bool,
    },
    /// Drop every queued message
    Clear,
    /// Get queue size and backend health
    Stats,
    /// Submit a new command payload for dispatch, publishing directly when
    /// the backend is available and buffering locally otherwise.
    Submit {
        /// Raw payload, in any shape `CommandProcessor` recognizes
        payload: HashMap<String, serde_json::Value>,
        /// Dispatch priority
        priority: edge_common::Priority,
        /// Distributed trace id, propagated onto the resulting message
        trace_id: Option<String>,
        /// Caller-supplied correlation id, propagated onto the resulting message
        correlation_id: Option<String>,
    },
}

/// Coordinator management commands. Mirrors `ServiceCoordinator`'s public
/// surface (`start_service`/`stop_service`/`get_services_status`/`health_check`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorCommand {
    /// List every registered service and its state
    ListServices,
    /// Start a specific service by name
    StartService {
        /// Service name, as registered with the coordinator
        name: String,
    },
    /// Stop a specific service by name
    StopService {
        /// Service name, as registered with the coordinator
        name: String,
    },
    /// Aggregate health across every registered service
    HealthCheck,
}

/// Offline buffer management commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OfflineCommand {
    /// Force a flush attempt regardless of the usual flush interval
    Flush,
    /// Number of entries currently buffered, by status
    Stats,
}

/// Response from the control server (versioned wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version
    pub version: u32,
    /// The actual response payload
    pub payload: ResponsePayload,
}

/// Response payload types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Command succeeded
    Ok,
    /// Command succeeded with data
    Data(Box<ResponseData>),
    /// Command failed with error message
    Error(String),
}

/// Response data types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
    /// System status information
    SystemStatus(SystemStatus),
    /// A single queued message, if any
    QueueMessage(Option<QueueMessageSummary>),
    /// Queue statistics
    QueueStats(QueueStats),
    /// Coordinator service states, by name
    ServiceStates(HashMap<String, ServiceSummary>),
    /// Aggregate coordinator health
    CoordinatorHealth(String),
    /// Offline buffer statistics
    OfflineStats(OfflineStats),
    /// Simple string message
    Message(String),
}

/// System status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Server version
    pub version: String,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Number of commands in the queue
    pub queue_size: usize,
    /// Number of registered coordinator services
    pub service_count: usize,
}

/// Queued message summary (for the peek command)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessageSummary {
    /// Message id
    pub id: String,
    /// Priority label
    pub priority: String,
    /// Time the message was enqueued (ISO 8601)
    pub timestamp: String,
    /// Number of prior delivery attempts
    pub retry_count: u32,
    /// Distributed trace id, if set
    pub trace_id: Option<String>,
}

/// Queue statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Total messages currently queued
    pub size: usize,
    /// Backend health status string
    pub health_status: String,
    /// Backend name (`"memory"`, `"amqp"`, `"cloud"`)
    pub backend: String,
}

/// Summary of a single coordinator-managed service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSummary {
    /// Current lifecycle status
    pub status: String,
    /// Restart attempts since the last successful start
    pub restart_attempts: u32,
    /// Consecutive failed health checks
    pub consecutive_failures: u32,
    /// Most recent error message, if any
    pub last_error: Option<String>,
}

/// Offline buffer statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineStats {
    /// Entries currently pending
    pub pending: usize,
    /// Entries that permanently failed (retry budget exhausted)
    pub failed: usize,
}

impl Request {
    /// Create a new request with the current protocol version
    #[must_use]
    pub const fn new(command: RequestCommand) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            token: None,
            command,
        }
    }

    /// Attach a bearer token to the request
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Check if the request version is compatible with the current version
    #[must_use]
    pub const fn is_version_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

impl Response {
    /// Create an error response
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Error(message.into()),
        }
    }

    /// Create a success response with no data
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Ok,
        }
    }

    /// Create a response with data
    #[must_use]
    pub fn data(data: ResponseData) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Data(Box::new(data)),
        }
    }

    /// Check if the response indicates success (not an error)
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self.payload, ResponsePayload::Error(_))
    }

    /// Check if the response version is compatible with the current version
    #[must_use]
    pub const fn is_version_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}
