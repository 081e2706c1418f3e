//! The service contract the coordinator supervises, and the bookkeeping it
//! keeps per registered service.
//!
//! Grounded on `original_source/src/robot_service/service_coordinator.py`'s
//! `ServiceBase` ABC (`name`, `start`, `stop`, `health_check`, `is_running`)
//! and its `ServiceConfig`/`ServiceState` dataclasses, widened with the
//! startup-retry and warmup fields added here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-service health, mirroring `edge_queue::HealthReport`'s nested-status
/// shape (a bare status string plus free-form detail) rather than depending
/// on `edge-queue` for a value type a non-queue service has no reason to
/// import. `"healthy"` and `"running"` are both treated as healthy, same
/// resolved open question as the queue backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl ServiceHealth {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            detail: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        let mut detail = serde_json::Map::new();
        detail.insert("error".to_string(), serde_json::Value::String(reason.into()));
        Self {
            status: "unhealthy".to_string(),
            detail,
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "running")
    }
}

/// A service the coordinator can start, stop, and health-check.
///
/// `name` is a method rather than a stored field so implementors can derive
/// it (e.g. from a wrapped `QueueHandler`'s queue backend) without storing a
/// redundant copy.
#[async_trait]
pub trait ManagedService: Send + Sync {
    fn name(&self) -> &str;

    /// Start the service. `Ok(false)` means "declined to start, not an
    /// error" (e.g. startup precondition not met); `Err` is a hard failure.
    async fn start(&self) -> crate::Result<bool>;

    /// Stop the service, honoring `timeout` on a best-effort basis.
    async fn stop(&self, timeout: std::time::Duration) -> crate::Result<bool>;

    async fn health_check(&self) -> crate::Result<ServiceHealth>;

    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Stopped,
    Starting,
    Running,
    Healthy,
    Unhealthy,
    Stopping,
    Error,
}

impl ServiceStatus {
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Healthy | Self::Unhealthy)
    }
}

/// Static configuration for a registered service.
/// `startup_retry_enabled`, `warmup_seconds`,
/// `max_startup_retry_attempts`, and `startup_retry_delay_seconds` support
/// the full startup-retry flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub service_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub auto_restart: bool,
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_seconds: f64,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_seconds: f64,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_seconds: f64,
    #[serde(default = "default_warmup_seconds")]
    pub warmup_seconds: f64,
    #[serde(default)]
    pub startup_retry_enabled: bool,
    #[serde(default = "default_max_startup_retry_attempts")]
    pub max_startup_retry_attempts: u32,
    #[serde(default = "default_startup_retry_delay")]
    pub startup_retry_delay_seconds: f64,
}

const fn default_true() -> bool {
    true
}
const fn default_max_restart_attempts() -> u32 {
    3
}
const fn default_restart_delay() -> f64 {
    2.0
}
const fn default_health_check_interval() -> f64 {
    30.0
}
const fn default_startup_timeout() -> f64 {
    5.0
}
const fn default_warmup_seconds() -> f64 {
    0.0
}
const fn default_max_startup_retry_attempts() -> u32 {
    3
}
const fn default_startup_retry_delay() -> f64 {
    1.0
}

impl ServiceConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            enabled: default_true(),
            auto_restart: default_true(),
            max_restart_attempts: default_max_restart_attempts(),
            restart_delay_seconds: default_restart_delay(),
            health_check_interval_seconds: default_health_check_interval(),
            startup_timeout_seconds: default_startup_timeout(),
            warmup_seconds: default_warmup_seconds(),
            startup_retry_enabled: false,
            max_startup_retry_attempts: default_max_startup_retry_attempts(),
            startup_retry_delay_seconds: default_startup_retry_delay(),
        }
    }
}

/// Mutable per-service bookkeeping the coordinator owns. `restart_attempts`
/// resets to 0 on every successful (re-)start; `startup_retry_count`
/// persists across the service's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
    pub config: ServiceConfig,
    pub status: ServiceStatus,
    pub restart_attempts: u32,
    pub startup_retry_count: u32,
    pub consecutive_failures: u32,
    pub last_health_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ServiceState {
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            status: ServiceStatus::Stopped,
            restart_attempts: 0,
            startup_retry_count: 0,
            consecutive_failures: 0,
            last_health_check: None,
            last_error: None,
            started_at: None,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }
}
