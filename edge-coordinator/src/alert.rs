//! Alerting and transition-observation hooks.
//!
//! `ServiceCoordinator` never decides what an alert *does* (page someone,
//! log, post to a channel); it only decides *when* to raise one and *why*.
//! Alert delivery is a trait so a caller can plug in a concrete sink
//! (log-only, webhook, whatever) rather than have one hardcoded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::service::ServiceStatus;

/// Why an alert was raised. The canonical four
/// (`StartupRetry`/`StartupFailed`/`RestartFailed`/`RestartUnhealthy`) are
/// the ones `service_coordinator.py` actually emits; `RestartExhausted` is
/// supplemented here -- the Python source sends only a
/// generic "max attempts reached" alert when the restart budget is already
/// spent, never a dedicated reason string, but §8's restart-bound property
/// requires operators be able to distinguish "gave up" from "this one
/// attempt failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    StartupRetry,
    StartupFailed,
    RestartFailed,
    RestartUnhealthy,
    RestartExhausted,
    HealthFailure,
    AllServicesStarted,
    AllServicesStopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub reason: AlertReason,
    pub service: Option<String>,
    pub title: String,
    pub body: String,
}

impl Alert {
    #[must_use]
    pub fn new(reason: AlertReason, service: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            reason,
            service: Some(service.into()),
            title: title.into(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn global(reason: AlertReason, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            reason,
            service: None,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Sink for coordinator-raised alerts. `edge-metrics` and `edge-control`
/// each supply their own implementation (counters and an admin feed,
/// respectively); both can be attached via `ServiceCoordinatorBuilder` or a
/// fan-out `AlertSink` composed of several.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, alert: Alert);
}

/// Tracing-backed sink used when no caller-supplied sink is configured.
/// Never drops an alert silently.
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn alert(&self, alert: Alert) {
        tracing::warn!(
            reason = ?alert.reason,
            service = alert.service.as_deref().unwrap_or("-"),
            title = %alert.title,
            body = %alert.body,
            "coordinator alert"
        );
    }
}

/// Observes every `(old, new)` status transition a service makes, alongside
/// its state at the moment of transition. Grounded on the same Python
/// callback shape generalized into its own trait: per-transition
/// observability is a first-class concern distinct from alerting, which
/// only fires on specific failure conditions.
#[async_trait]
pub trait TransitionObserver: Send + Sync {
    async fn on_transition(&self, service: &str, old: ServiceStatus, new: ServiceStatus);
}
