//! Supervises named services (worker pools, offline buffers, batch
//! executors): starts and stops them, health-checks them on an interval,
//! and auto-restarts ones that repeatedly fail, up to a bounded number of
//! attempts. Also exposes an HTTP `/health/live` + `/health/ready` surface
//! for orchestrator probes.

mod alert;
mod config;
mod coordinator;
mod error;
mod server;
mod service;

pub use alert::{Alert, AlertReason, AlertSink, TracingAlertSink, TransitionObserver};
pub use config::{CoordinatorConfig, HttpConfig};
pub use coordinator::ServiceCoordinator;
pub use error::{CoordinatorError, Result};
pub use server::HealthServer;
pub use service::{ManagedService, ServiceConfig, ServiceHealth, ServiceState, ServiceStatus};
