//! `ManagedService` adapters for subsystems that don't depend on
//! `edge-coordinator` themselves (`edge-worker::QueueHandler`,
//! `edge-batch::BatchExecutor`), so the top-level binary can register them
//! with a [`edge_coordinator::ServiceCoordinator`] like
//! `edge_offline::OfflineBufferService` already does natively.
//!
//! Grounded on `edge-offline/src/service.rs`'s own `ManagedService` impl
//! for the shape (`start`/`stop`/`health_check`/`is_running` delegating to
//! the wrapped type, domain errors mapped to `CoordinatorError::Service`).

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use edge_batch::BatchExecutor;
use edge_coordinator::{CoordinatorError, ManagedService, ServiceHealth};
use edge_worker::QueueHandler;

/// Wraps a [`QueueHandler`] so the coordinator can start/stop/health-check
/// the worker pool alongside every other managed service.
pub struct WorkerPoolService {
    name: String,
    handler: Arc<QueueHandler>,
    stop_timeout: Duration,
    running: AtomicBool,
}

impl WorkerPoolService {
    #[must_use]
    pub fn new(name: impl Into<String>, handler: Arc<QueueHandler>, stop_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            handler,
            stop_timeout,
            running: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ManagedService for WorkerPoolService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> edge_coordinator::Result<bool> {
        self.handler.start().await;
        self.running.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn stop(&self, timeout: Duration) -> edge_coordinator::Result<bool> {
        self.handler.stop(timeout.max(self.stop_timeout)).await;
        self.running.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn health_check(&self) -> edge_coordinator::Result<ServiceHealth> {
        let report = self
            .handler
            .health_check()
            .await
            .map_err(|e| CoordinatorError::Service(e.to_string()))?;

        Ok(if report.status == "healthy" || report.status == "running" {
            ServiceHealth::healthy()
        } else {
            ServiceHealth::unhealthy(report.status)
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Wraps a [`BatchExecutor`]. The executor has no explicit start/stop
/// lifecycle of its own (it proxies the queue it was built with), so
/// `start`/`stop` only flip the bookkeeping flag the coordinator relies on
/// for status reporting.
pub struct BatchExecutorService {
    name: String,
    executor: Arc<BatchExecutor>,
    running: AtomicBool,
}

impl BatchExecutorService {
    #[must_use]
    pub fn new(name: impl Into<String>, executor: Arc<BatchExecutor>) -> Self {
        Self {
            name: name.into(),
            executor,
            running: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ManagedService for BatchExecutorService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> edge_coordinator::Result<bool> {
        self.running.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn stop(&self, _timeout: Duration) -> edge_coordinator::Result<bool> {
        self.running.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn health_check(&self) -> edge_coordinator::Result<ServiceHealth> {
        let report = self
            .executor
            .health_check()
            .await
            .map_err(|e| CoordinatorError::Service(e.to_string()))?;

        Ok(if report.status == "healthy" || report.status == "running" {
            ServiceHealth::healthy()
        } else {
            ServiceHealth::unhealthy(report.status)
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
