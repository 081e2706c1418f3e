//! The supervisor itself: registration, start/stop of individual and all
//! services, the periodic health-check loop racing a shutdown signal, and
//! the auto-restart flow on repeated health-check failure. The periodic
//! loop uses the same `tokio::select!` timer/shutdown race as
//! `edge-worker::QueueHandler`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use edge_common::Signal;
use tokio::sync::{broadcast, RwLock};

use crate::{
    alert::{Alert, AlertReason, AlertSink, TracingAlertSink, TransitionObserver},
    config::CoordinatorConfig,
    error::{CoordinatorError, Result},
    service::{ManagedService, ServiceConfig, ServiceHealth, ServiceState, ServiceStatus},
};

struct Registration {
    service: Arc<dyn ManagedService>,
    state: ServiceState,
}

/// Supervises a set of named [`ManagedService`]s: starts and stops them,
/// health-checks them on an interval, and auto-restarts ones that fail
/// repeated health checks, up to a bounded number of attempts.
pub struct ServiceCoordinator {
    config: CoordinatorConfig,
    registrations: RwLock<HashMap<String, Registration>>,
    alert_sink: Arc<dyn AlertSink>,
    transition_observer: Option<Arc<dyn TransitionObserver>>,
    shutdown_tx: broadcast::Sender<Signal>,
    running: std::sync::atomic::AtomicBool,
    health_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ServiceCoordinator {
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_alert_sink(config, Arc::new(TracingAlertSink))
    }

    #[must_use]
    pub fn with_alert_sink(config: CoordinatorConfig, alert_sink: Arc<dyn AlertSink>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            config,
            registrations: RwLock::new(HashMap::new()),
            alert_sink,
            transition_observer: None,
            shutdown_tx,
            running: std::sync::atomic::AtomicBool::new(false),
            health_task: tokio::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_transition_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.transition_observer = Some(observer);
        self
    }

    /// Register a service under `config.name`. Fails if a service is
    /// already registered under that name and is currently running; callers
    /// must `stop_service` (or let it fail/stop on its own) before
    /// replacing it. A stopped registration under the same name is silently
    /// replaced.
    pub async fn register_service(
        &self,
        service: Arc<dyn ManagedService>,
        config: ServiceConfig,
    ) -> Result<()> {
        let mut registrations = self.registrations.write().await;
        if let Some(existing) = registrations.get(&config.name) {
            if existing.state.is_running() {
                return Err(CoordinatorError::AlreadyRunning(config.name));
            }
        }
        let name = config.name.clone();
        registrations.insert(
            name,
            Registration {
                service,
                state: ServiceState::new(config),
            },
        );
        Ok(())
    }

    pub async fn unregister_service(&self, name: &str) -> Result<()> {
        let mut registrations = self.registrations.write().await;
        registrations
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))
    }

    async fn transition(&self, name: &str, old: ServiceStatus, new: ServiceStatus) {
        if let Some(observer) = &self.transition_observer {
            observer.on_transition(name, old, new).await;
        }
    }

    async fn alert(&self, alert: Alert) {
        self.alert_sink.alert(alert).await;
    }

    /// One bare `service.start()` call with the configured startup timeout,
    /// updating state on success or failure but applying no retry. The
    /// retry loop lives in [`Self::start_service`]; restarts call this
    /// directly so the service's lifetime start-call bound holds.
    async fn invoke_start(&self, name: &str) -> Result<bool> {
        let (service, timeout, old_status) = {
            let registrations = self.registrations.read().await;
            let reg = registrations
                .get(name)
                .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
            (
                Arc::clone(&reg.service),
                Duration::from_secs_f64(reg.state.config.startup_timeout_seconds),
                reg.state.status,
            )
        };

        self.set_status(name, ServiceStatus::Starting).await?;
        self.transition(name, old_status, ServiceStatus::Starting).await;

        let outcome = tokio::time::timeout(timeout, service.start()).await;

        let mut registrations = self.registrations.write().await;
        let reg = registrations
            .get_mut(name)
            .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;

        match outcome {
            Ok(Ok(true)) => {
                reg.state.status = ServiceStatus::Running;
                reg.state.restart_attempts = 0;
                reg.state.last_error = None;
                reg.state.started_at = Some(Utc::now());
                self.transition(name, ServiceStatus::Starting, ServiceStatus::Running).await;
                Ok(true)
            }
            Ok(Ok(false)) => {
                reg.state.status = ServiceStatus::Error;
                reg.state.last_error = Some("start declined".to_string());
                Ok(false)
            }
            Ok(Err(err)) => {
                reg.state.status = ServiceStatus::Error;
                reg.state.last_error = Some(err.to_string());
                Ok(false)
            }
            Err(_elapsed) => {
                reg.state.status = ServiceStatus::Error;
                reg.state.last_error = Some("startup timed out".to_string());
                Ok(false)
            }
        }
    }

    async fn set_status(&self, name: &str, status: ServiceStatus) -> Result<()> {
        let mut registrations = self.registrations.write().await;
        let reg = registrations
            .get_mut(name)
            .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
        reg.state.status = status;
        Ok(())
    }

    /// Start a service, retrying the initial attempt up to
    /// `config.max_startup_retry_attempts` times (if
    /// `config.startup_retry_enabled`) before giving up and alerting
    /// `StartupFailed`. Grounded on `start_service`'s `asyncio.wait_for`
    /// wrapped start call, extended with the supplemented retry loop.
    pub async fn start_service(&self, name: &str) -> Result<bool> {
        let (retry_enabled, max_retries, retry_delay) = {
            let registrations = self.registrations.read().await;
            let reg = registrations
                .get(name)
                .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
            (
                reg.state.config.startup_retry_enabled,
                reg.state.config.max_startup_retry_attempts,
                Duration::from_secs_f64(reg.state.config.startup_retry_delay_seconds),
            )
        };

        loop {
            if self.invoke_start(name).await? {
                return Ok(true);
            }

            let attempt = {
                let mut registrations = self.registrations.write().await;
                let reg = registrations
                    .get_mut(name)
                    .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
                reg.state.startup_retry_count += 1;
                reg.state.startup_retry_count
            };

            if retry_enabled && attempt <= max_retries {
                self.alert(Alert::new(
                    AlertReason::StartupRetry,
                    name,
                    "service startup retry",
                    format!("retry {attempt}/{max_retries} for {name}"),
                ))
                .await;
                tokio::time::sleep(retry_delay).await;
                continue;
            }

            self.alert(Alert::new(
                AlertReason::StartupFailed,
                name,
                "service failed to start",
                format!("{name} did not start after {attempt} attempt(s)"),
            ))
            .await;
            return Ok(false);
        }
    }

    /// Stop a service. Resets `restart_attempts`/`consecutive_failures` and
    /// clears `started_at` on success, matching `stop_service`.
    pub async fn stop_service(&self, name: &str, timeout: Option<Duration>) -> Result<bool> {
        let (service, old_status) = {
            let registrations = self.registrations.read().await;
            let reg = registrations
                .get(name)
                .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
            (Arc::clone(&reg.service), reg.state.status)
        };

        self.set_status(name, ServiceStatus::Stopping).await?;
        self.transition(name, old_status, ServiceStatus::Stopping).await;

        let outcome = service.stop(timeout.unwrap_or(Duration::from_secs(10))).await;

        let mut registrations = self.registrations.write().await;
        let reg = registrations
            .get_mut(name)
            .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;

        match outcome {
            Ok(true) => {
                reg.state.status = ServiceStatus::Stopped;
                reg.state.restart_attempts = 0;
                reg.state.consecutive_failures = 0;
                reg.state.started_at = None;
                Ok(true)
            }
            Ok(false) => {
                reg.state.status = ServiceStatus::Error;
                reg.state.last_error = Some("stop declined".to_string());
                Ok(false)
            }
            Err(err) => {
                reg.state.status = ServiceStatus::Error;
                reg.state.last_error = Some(err.to_string());
                Ok(false)
            }
        }
    }

    /// Start every enabled, registered service in registration order.
    /// Disabled services are skipped and counted as success. Sends
    /// `AllServicesStarted` if every attempted service started.
    pub async fn start_all(&self) -> Result<bool> {
        let names: Vec<String> = {
            let registrations = self.registrations.read().await;
            registrations.keys().cloned().collect()
        };

        let mut all_ok = true;
        for name in names {
            let enabled = {
                let registrations = self.registrations.read().await;
                registrations
                    .get(&name)
                    .is_some_and(|reg| reg.state.config.enabled)
            };
            if !enabled {
                continue;
            }
            if !self.start_service(&name).await? {
                all_ok = false;
            }
        }

        if all_ok {
            self.alert(Alert::global(
                AlertReason::AllServicesStarted,
                "all services started",
                "every enabled service started successfully",
            ))
            .await;
        }
        Ok(all_ok)
    }

    pub async fn stop_all(&self, timeout: Option<Duration>) -> Result<bool> {
        let names: Vec<String> = {
            let registrations = self.registrations.read().await;
            registrations.keys().cloned().collect()
        };

        let mut all_ok = true;
        for name in names {
            if !self.stop_service(&name, timeout).await? {
                all_ok = false;
            }
        }

        if all_ok {
            self.alert(Alert::global(
                AlertReason::AllServicesStopped,
                "all services stopped",
                "every service stopped successfully",
            ))
            .await;
        }
        Ok(all_ok)
    }

    /// Run one health check and update state, without acting on the
    /// result. A leaf call with no path back into [`Self::handle_health_failure`],
    /// so it's safe to call from within the restart flow itself without
    /// mutual async recursion. Returns whether the service is healthy; a
    /// no-op (reporting healthy) if the service isn't running.
    async fn evaluate_health(&self, name: &str) -> Result<bool> {
        let (service, is_running, old_status) = {
            let registrations = self.registrations.read().await;
            let reg = registrations
                .get(name)
                .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
            (Arc::clone(&reg.service), reg.state.is_running(), reg.state.status)
        };

        if !is_running {
            return Ok(true);
        }

        let health = service.health_check().await;
        let is_healthy = matches!(&health, Ok(h) if h.is_healthy());

        {
            let mut registrations = self.registrations.write().await;
            let reg = registrations
                .get_mut(name)
                .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
            reg.state.last_health_check = Some(Utc::now());
            if is_healthy {
                reg.state.status = ServiceStatus::Healthy;
                reg.state.consecutive_failures = 0;
            } else {
                reg.state.status = ServiceStatus::Unhealthy;
                reg.state.consecutive_failures += 1;
                if let Err(err) = &health {
                    reg.state.last_error = Some(err.to_string());
                }
            }
        }

        self.transition(
            name,
            old_status,
            if is_healthy { ServiceStatus::Healthy } else { ServiceStatus::Unhealthy },
        )
        .await;

        Ok(is_healthy)
    }

    /// Health-check one running service, updating its status and
    /// triggering the restart flow on repeated failure. A no-op if the
    /// service is not currently running.
    pub async fn check_service_health(&self, name: &str) -> Result<()> {
        if !self.evaluate_health(name).await? {
            self.handle_health_failure(name).await?;
        }
        Ok(())
    }

    pub async fn check_all_services_health(&self) -> Result<()> {
        let names: Vec<String> = {
            let registrations = self.registrations.read().await;
            registrations.keys().cloned().collect()
        };
        for name in names {
            self.check_service_health(&name).await?;
        }
        Ok(())
    }

    async fn handle_health_failure(&self, name: &str) -> Result<()> {
        let (consecutive_failures, alert_threshold, auto_restart, restart_attempts, max_restart_attempts) = {
            let registrations = self.registrations.read().await;
            let reg = registrations
                .get(name)
                .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
            (
                reg.state.consecutive_failures,
                self.config.alert_threshold,
                reg.state.config.auto_restart,
                reg.state.restart_attempts,
                reg.state.config.max_restart_attempts,
            )
        };

        if consecutive_failures < alert_threshold {
            return Ok(());
        }

        self.alert(Alert::new(
            AlertReason::HealthFailure,
            name,
            "service unhealthy",
            format!("{name} failed {consecutive_failures} consecutive health checks"),
        ))
        .await;

        if !auto_restart {
            return Ok(());
        }

        if restart_attempts >= max_restart_attempts {
            self.alert(Alert::new(
                AlertReason::RestartExhausted,
                name,
                "restart budget exhausted",
                format!("{name} exhausted its {max_restart_attempts} restart attempt(s); operator intervention required"),
            ))
            .await;
            return Ok(());
        }

        self.attempt_restart(name).await
    }

    /// `stop(10s) -> sleep(restart_delay) -> invoke_start() -> sleep(warmup) -> re-probe`,
    /// grounded on `_attempt_restart`. Uses [`Self::invoke_start`] rather
    /// than [`Self::start_service`] so a restart contributes exactly one
    /// `service.start()` call toward the service's lifetime bound.
    async fn attempt_restart(&self, name: &str) -> Result<()> {
        let (restart_delay, warmup) = {
            let mut registrations = self.registrations.write().await;
            let reg = registrations
                .get_mut(name)
                .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
            reg.state.restart_attempts += 1;
            (
                Duration::from_secs_f64(reg.state.config.restart_delay_seconds),
                Duration::from_secs_f64(reg.state.config.warmup_seconds),
            )
        };

        self.stop_service(name, Some(Duration::from_secs(10))).await?;
        tokio::time::sleep(restart_delay).await;

        if !self.invoke_start(name).await? {
            self.alert(Alert::new(
                AlertReason::RestartFailed,
                name,
                "restart failed",
                format!("{name} did not come back up during restart"),
            ))
            .await;
            return Ok(());
        }

        tokio::time::sleep(warmup).await;
        let healthy = self.evaluate_health(name).await?;

        if healthy {
            let mut registrations = self.registrations.write().await;
            if let Some(reg) = registrations.get_mut(name) {
                reg.state.restart_attempts = 0;
                reg.state.consecutive_failures = 0;
            }
        } else {
            self.alert(Alert::new(
                AlertReason::RestartUnhealthy,
                name,
                "restarted but still unhealthy",
                format!("{name} restarted but failed its post-restart health check"),
            ))
            .await;
        }

        Ok(())
    }

    async fn periodic_health_check(&self, mut shutdown: broadcast::Receiver<Signal>) {
        let interval = Duration::from_secs_f64(self.config.health_check_interval_seconds);
        loop {
            tokio::select! {
                biased;
                signal = shutdown.recv() => {
                    match signal {
                        Ok(Signal::Shutdown | Signal::Finalised) | Err(_) => break,
                    }
                }
                () = tokio::time::sleep(interval) => {
                    if let Err(err) = self.check_all_services_health().await {
                        tracing::error!(%err, "periodic health check failed");
                    }
                }
            }
        }
    }

    /// Start every enabled service, run an initial health sweep, then spawn
    /// the periodic health-check loop. Returns whether `start_all` fully
    /// succeeded.
    pub async fn start(self: &Arc<Self>) -> Result<bool> {
        self.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let all_ok = self.start_all().await?;
        self.check_all_services_health().await?;

        let this = Arc::clone(self);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { this.periodic_health_check(shutdown_rx).await });
        *self.health_task.lock().await = Some(handle);

        Ok(all_ok)
    }

    /// Stop the periodic health-check loop and every registered service.
    pub async fn stop(&self, timeout: Option<Duration>) -> Result<()> {
        self.running.store(false, std::sync::atomic::Ordering::SeqCst);
        let _ = self.shutdown_tx.send(Signal::Shutdown);

        if let Some(handle) = self.health_task.lock().await.take() {
            let _ = handle.await;
        }

        self.stop_all(timeout).await?;
        Ok(())
    }

    pub async fn get_services_status(&self) -> HashMap<String, ServiceState> {
        let registrations = self.registrations.read().await;
        registrations
            .iter()
            .map(|(name, reg)| (name.clone(), reg.state.clone()))
            .collect()
    }

    /// The coordinator's own health: `"healthy"` iff it is running and
    /// every registered service is in the `Healthy`/`Running` status,
    /// mirroring `ServiceCoordinator.health_check`'s nested-per-service
    /// shape in the Python source.
    pub async fn health_check(&self) -> ServiceHealth {
        let registrations = self.registrations.read().await;
        let running = self.running.load(std::sync::atomic::Ordering::SeqCst);

        let mut services = serde_json::Map::new();
        let mut all_healthy = !registrations.is_empty();
        for (name, reg) in registrations.iter() {
            let healthy = matches!(reg.state.status, ServiceStatus::Healthy | ServiceStatus::Running);
            all_healthy &= healthy || !reg.state.config.enabled;
            services.insert(
                name.clone(),
                serde_json::json!({ "status": format!("{:?}", reg.state.status), "healthy": healthy }),
            );
        }

        let mut detail = serde_json::Map::new();
        detail.insert("running".to_string(), serde_json::Value::Bool(running));
        detail.insert("service_count".to_string(), registrations.len().into());
        detail.insert("services".to_string(), serde_json::Value::Object(services));

        if running && all_healthy {
            ServiceHealth {
                status: "healthy".to_string(),
                detail,
            }
        } else {
            ServiceHealth {
                status: "unhealthy".to_string(),
                detail,
            }
        }
    }
}
