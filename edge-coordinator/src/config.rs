//! Coordinator-wide configuration

use serde::Deserialize;

/// Top-level coordinator settings, distinct from per-service
/// [`crate::ServiceConfig`]. Grounded on
/// `service_coordinator.py::ServiceCoordinator.__init__`'s keyword defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_seconds: f64,

    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u32,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: default_health_check_interval(),
            alert_threshold: default_alert_threshold(),
            http: HttpConfig::default(),
        }
    }
}

const fn default_health_check_interval() -> f64 {
    30.0
}

const fn default_alert_threshold() -> u32 {
    3
}

/// The HTTP liveness/readiness surface: listen address and an enable
/// flag, matching the coordinator's own health rather than SMTP/spool/DNS
/// flags.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}
