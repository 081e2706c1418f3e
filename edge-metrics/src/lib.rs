//! OpenTelemetry metrics for the edge robot command service
//!
//! This crate provides observability instrumentation using OpenTelemetry.
//! It exports metrics via OTLP to an OpenTelemetry Collector, which can expose them
//! in Prometheus format for scraping.
//!
//! # Features
//!
//! - **Command Metrics**: enqueue/ack/nack counts, offline-buffer occupancy,
//!   coordinator restart attempts and health check failures
//! - **OTLP Export**: push metrics to an OpenTelemetry Collector
//!
//! # Architecture
//!
//! ```text
//! edge → OTLP/HTTP → OpenTelemetry Collector → Prometheus (scrape) → Grafana
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use edge_metrics::{init_metrics, MetricsConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MetricsConfig {
//!     enabled: true,
//!     endpoint: "http://localhost:4318".to_string(),
//!     max_robot_cardinality: 1000,
//!     high_priority_robots: vec!["robot-001".to_string()],
//!     api_key: None,
//! };
//!
//! init_metrics(&config)?;
//! # Ok(())
//! # }
//! ```

mod command;
mod config;
mod error;
mod exporter;

pub use command::CommandMetrics;
pub use config::MetricsConfig;
pub use error::MetricsError;
use once_cell::sync::OnceCell;

/// Global metrics instance
static METRICS_INSTANCE: OnceCell<Metrics> = OnceCell::new();

/// Root metrics container
#[derive(Debug)]
pub struct Metrics {
    pub commands: CommandMetrics,
}

/// Initialize the metrics system
///
/// This must be called once at startup before any metrics are recorded.
/// If metrics are disabled in the config, this is a no-op.
///
/// Metrics will be pushed to the configured OTLP endpoint (typically an
/// OpenTelemetry Collector) which can then expose them for Prometheus to scrape.
///
/// # Errors
///
/// Returns an error if metrics initialization fails or if called multiple times.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        tracing::info!("Metrics collection is disabled");
        return Ok(());
    }

    tracing::info!(
        endpoint = %config.endpoint,
        "Initializing OpenTelemetry metrics with OTLP exporter"
    );

    let provider = exporter::init_otlp_exporter(&config.endpoint)?;

    opentelemetry::global::set_meter_provider(provider);

    let commands = CommandMetrics::new(config.max_robot_cardinality, config.high_priority_robots.clone())?;

    let metrics = Metrics { commands };

    METRICS_INSTANCE
        .set(metrics)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    tracing::info!("Metrics collection initialized successfully");

    Ok(())
}

/// Get a reference to the global metrics instance
///
/// # Panics
///
/// Panics if metrics have not been initialized via `init_metrics()`.
#[must_use]
pub fn metrics() -> &'static Metrics {
    METRICS_INSTANCE
        .get()
        .expect("Metrics not initialized. Call init_metrics() first.")
}

/// Check if metrics are enabled
#[must_use]
pub fn is_enabled() -> bool {
    METRICS_INSTANCE.get().is_some()
}
