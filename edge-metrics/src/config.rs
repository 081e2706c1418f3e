//! Metrics configuration

use serde::Deserialize;

/// Configuration for metrics collection and export
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Enable or disable metrics collection
    ///
    /// When disabled, all metrics operations become no-ops with minimal overhead.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// OTLP endpoint URL for metrics export
    ///
    /// Metrics will be pushed to this OpenTelemetry Collector endpoint using OTLP over HTTP.
    /// The Collector can then expose metrics for Prometheus to scrape.
    ///
    /// Common values:
    /// - `http://localhost:4318` (OTLP HTTP default for local development)
    /// - `http://otel-collector:4318` (Docker Compose service name)
    /// - `http://otel-collector.monitoring.svc.cluster.local:4318` (Kubernetes)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Maximum number of unique robots to track individually in metrics
    ///
    /// High-cardinality labels (like `robot_id`) can create thousands of metric series
    /// which impacts Prometheus memory and query performance. This limit caps the number
    /// of unique robots that will be tracked individually.
    ///
    /// Once the limit is reached, additional robots are bucketed into an "other" category.
    /// This prevents metric explosion while still tracking the most active robots.
    ///
    /// Recommended values:
    /// - Small fleets (< 100 robots): 100
    /// - Medium fleets (100-1000 robots): 500
    /// - Large fleets (1000+ robots): 1000
    ///
    /// Default: 1000
    #[serde(default = "default_max_robot_cardinality")]
    pub max_robot_cardinality: usize,

    /// Robots that should always be tracked individually
    ///
    /// These robot IDs bypass the cardinality limit and are always tracked with their
    /// full `robot_id`. Useful for prioritizing metrics for flagship or high-value units.
    ///
    /// Example:
    /// ```ron
    /// high_priority_robots: [
    ///     "robot-001",
    ///     "robot-002",
    /// ]
    /// ```
    ///
    /// Default: empty list
    #[serde(default)]
    pub high_priority_robots: Vec<String>,

    /// Optional API key for authenticating with the OTLP collector
    ///
    /// When set, this API key will be sent in the `Authorization: Bearer <key>` header
    /// with all OTLP metric exports. The collector must be configured to validate this key.
    ///
    /// **Security Note:** This stores the API key in plaintext in the configuration file.
    /// For better security, consider using environment variable substitution in your
    /// configuration management system, or mounting secrets in Kubernetes.
    ///
    /// Default: None (no authentication)
    #[serde(default)]
    pub api_key: Option<String>,
}

const fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:4318/v1/metrics".to_string()
}

const fn default_max_robot_cardinality() -> usize {
    1000
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            max_robot_cardinality: default_max_robot_cardinality(),
            high_priority_robots: Vec::new(),
            api_key: None,
        }
    }
}
