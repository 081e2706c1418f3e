use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use edge_coordinator::{
    Alert, AlertReason, AlertSink, CoordinatorConfig, ManagedService, ServiceConfig,
    ServiceCoordinator, ServiceHealth,
};
use tokio::sync::Mutex;

/// A service whose `start` fails a fixed number of times before succeeding,
/// and whose health check always reports healthy once running.
struct FlakyService {
    name: String,
    start_calls: AtomicU32,
    fail_first: u32,
    running: std::sync::atomic::AtomicBool,
}

impl FlakyService {
    fn new(name: &str, fail_first: u32) -> Self {
        Self {
            name: name.to_string(),
            start_calls: AtomicU32::new(0),
            fail_first,
            running: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ManagedService for FlakyService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> edge_coordinator::Result<bool> {
        let attempt = self.start_calls.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Ok(false);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn stop(&self, _timeout: Duration) -> edge_coordinator::Result<bool> {
        self.running.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn health_check(&self) -> edge_coordinator::Result<ServiceHealth> {
        if self.running.load(Ordering::SeqCst) {
            Ok(ServiceHealth::healthy())
        } else {
            Ok(ServiceHealth::unhealthy("not running"))
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// A service that is always running and always reports unhealthy, to drive
/// the auto-restart path without the coordinator ever seeing it recover.
struct AlwaysUnhealthyService {
    start_calls: AtomicU32,
}

#[async_trait]
impl ManagedService for AlwaysUnhealthyService {
    fn name(&self) -> &str {
        "always-unhealthy"
    }

    async fn start(&self) -> edge_coordinator::Result<bool> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn stop(&self, _timeout: Duration) -> edge_coordinator::Result<bool> {
        Ok(true)
    }

    async fn health_check(&self) -> edge_coordinator::Result<ServiceHealth> {
        Ok(ServiceHealth::unhealthy("always sick"))
    }

    fn is_running(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct RecordingSink {
    alerts: Mutex<Vec<Alert>>,
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn alert(&self, alert: Alert) {
        self.alerts.lock().await.push(alert);
    }
}

#[tokio::test]
async fn start_stop_lifecycle_resets_counters() {
    let coordinator = Arc::new(ServiceCoordinator::new(CoordinatorConfig::default()));
    let service = Arc::new(FlakyService::new("worker", 0));
    coordinator
        .register_service(service, ServiceConfig::new("worker", "queue_worker"))
        .await
        .unwrap();

    assert!(coordinator.start_service("worker").await.unwrap());
    assert!(coordinator.stop_service("worker", None).await.unwrap());

    let statuses = coordinator.get_services_status().await;
    let state = &statuses["worker"];
    assert_eq!(state.restart_attempts, 0);
    assert_eq!(state.consecutive_failures, 0);
    assert!(state.started_at.is_none());
}

#[tokio::test]
async fn registration_is_rejected_while_the_previous_instance_is_running() {
    let coordinator = ServiceCoordinator::new(CoordinatorConfig::default());
    let service = Arc::new(FlakyService::new("worker", 0));
    coordinator
        .register_service(service.clone(), ServiceConfig::new("worker", "queue_worker"))
        .await
        .unwrap();
    coordinator.start_service("worker").await.unwrap();

    let err = coordinator
        .register_service(service, ServiceConfig::new("worker", "queue_worker"))
        .await
        .unwrap_err();
    assert!(matches!(err, edge_coordinator::CoordinatorError::AlreadyRunning(_)));
}

#[tokio::test]
async fn startup_retry_loop_recovers_from_early_failures() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = ServiceCoordinator::with_alert_sink(CoordinatorConfig::default(), sink.clone());
    let service = Arc::new(FlakyService::new("worker", 2));
    let mut config = ServiceConfig::new("worker", "queue_worker");
    config.startup_retry_enabled = true;
    config.max_startup_retry_attempts = 5;
    config.startup_retry_delay_seconds = 0.01;
    coordinator.register_service(service.clone(), config).await.unwrap();

    assert!(coordinator.start_service("worker").await.unwrap());
    assert_eq!(service.start_calls.load(Ordering::SeqCst), 3);

    let alerts = sink.alerts.lock().await;
    assert!(alerts.iter().any(|a| a.reason == AlertReason::StartupRetry));
}

#[tokio::test]
async fn auto_restart_gives_up_after_the_configured_budget_and_alerts_exhausted() {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = ServiceCoordinator::with_alert_sink(CoordinatorConfig {
        alert_threshold: 1,
        ..CoordinatorConfig::default()
    }, sink.clone());
    let service = Arc::new(AlwaysUnhealthyService {
        start_calls: AtomicU32::new(0),
    });
    let mut config = ServiceConfig::new("always-unhealthy", "queue_worker");
    config.max_restart_attempts = 2;
    config.restart_delay_seconds = 0.0;
    config.warmup_seconds = 0.0;
    coordinator.register_service(service.clone(), config).await.unwrap();

    coordinator.start_service("always-unhealthy").await.unwrap();

    // Drive enough health-check failures to exhaust the restart budget:
    // each failing check re-triggers a restart, each restart re-probes and
    // fails again, so three checks is enough to reach the cap of 2.
    for _ in 0..3 {
        coordinator
            .check_service_health("always-unhealthy")
            .await
            .unwrap();
    }

    let statuses = coordinator.get_services_status().await;
    assert_eq!(statuses["always-unhealthy"].restart_attempts, 2);

    let alerts = sink.alerts.lock().await;
    assert!(alerts.iter().any(|a| a.reason == AlertReason::RestartExhausted));
    // One start() for the initial start_service, then one per restart attempt.
    assert_eq!(service.start_calls.load(Ordering::SeqCst), 1 + 2);
}

#[tokio::test]
async fn health_check_with_zero_registered_services_is_unhealthy() {
    let coordinator = Arc::new(ServiceCoordinator::new(CoordinatorConfig::default()));
    coordinator.start().await.unwrap();

    let health = coordinator.health_check().await;
    assert_eq!(health.status, "unhealthy");
    assert_eq!(health.detail["service_count"], 0);

    coordinator.stop(None).await.unwrap();
}
