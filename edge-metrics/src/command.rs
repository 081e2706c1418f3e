//! Command-processing metrics
//!
//! Tracks the command-queue/worker/coordinator pipeline:
//! - Commands enqueued, by priority
//! - Commands acked/nacked by workers
//! - Commands buffered while offline, by buffer name
//! - Coordinator restart attempts and health check failures, by service

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter, UpDownCounter},
};

use crate::MetricsError;

/// Bounds the cardinality of the `robot_id` label.
///
/// `high_priority_robots` are always tracked under their own id; any other
/// `robot_id` is tracked individually until `max_robot_cardinality` distinct
/// ids have been seen, after which it falls back to the `"other"` bucket.
#[derive(Debug)]
struct RobotCardinalityLimiter {
    max: usize,
    high_priority: DashSet<String>,
    seen: DashSet<String>,
}

impl RobotCardinalityLimiter {
    fn new(max: usize, high_priority: Vec<String>) -> Self {
        Self {
            max,
            high_priority: high_priority.into_iter().collect(),
            seen: DashSet::new(),
        }
    }

    /// Returns the label value to use for `robot_id` in a metric attribute.
    fn bucket(&self, robot_id: &str) -> String {
        if self.high_priority.contains(robot_id) || self.seen.contains(robot_id) {
            return robot_id.to_string();
        }

        if self.seen.len() < self.max {
            self.seen.insert(robot_id.to_string());
            return robot_id.to_string();
        }

        "other".to_string()
    }
}

/// Command-pipeline metrics collector
#[derive(Debug)]
pub struct CommandMetrics {
    /// Total number of commands enqueued, by priority
    commands_enqueued: Counter<u64>,

    /// Total number of commands acked by a worker
    commands_acked: Counter<u64>,

    /// Total number of commands nacked by a worker, by whether they were requeued
    commands_nacked: Counter<u64>,

    /// Number of commands currently held in an offline buffer, by buffer name
    commands_buffered: UpDownCounter<i64>,

    /// Total number of coordinator-driven service restart attempts, by service name
    restart_attempts: Counter<u64>,

    /// Total number of consecutive-failure health checks, by service name
    health_check_failures: Counter<u64>,

    buffered_count: AtomicU64,
    robots: RobotCardinalityLimiter,
}

impl CommandMetrics {
    /// Create a new command metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new(max_robot_cardinality: usize, high_priority_robots: Vec<String>) -> Result<Self, MetricsError> {
        let meter = meter();

        let commands_enqueued = meter
            .u64_counter("edge.commands.enqueued.total")
            .with_description("Total number of commands enqueued, by priority")
            .build();

        let commands_acked = meter
            .u64_counter("edge.commands.acked.total")
            .with_description("Total number of commands acked by a worker")
            .build();

        let commands_nacked = meter
            .u64_counter("edge.commands.nacked.total")
            .with_description("Total number of commands nacked by a worker")
            .build();

        let commands_buffered = meter
            .i64_up_down_counter("edge.commands.buffered")
            .with_description("Number of commands currently held in an offline buffer")
            .build();

        let restart_attempts = meter
            .u64_counter("edge.coordinator.restart_attempts.total")
            .with_description("Total number of service restart attempts")
            .build();

        let health_check_failures = meter
            .u64_counter("edge.coordinator.health_check_failures.total")
            .with_description("Total number of consecutive-failure health checks")
            .build();

        Ok(Self {
            commands_enqueued,
            commands_acked,
            commands_nacked,
            commands_buffered,
            restart_attempts,
            health_check_failures,
            buffered_count: AtomicU64::new(0),
            robots: RobotCardinalityLimiter::new(max_robot_cardinality, high_priority_robots),
        })
    }

    /// Record a command enqueued for `robot_id` at `priority`.
    pub fn record_enqueued(&self, robot_id: &str, priority: &str) {
        let attributes = [
            KeyValue::new("robot_id", self.robots.bucket(robot_id)),
            KeyValue::new("priority", priority.to_string()),
        ];
        self.commands_enqueued.add(1, &attributes);
    }

    /// Record a command acked by a worker.
    pub fn record_acked(&self, robot_id: &str) {
        let attributes = [KeyValue::new("robot_id", self.robots.bucket(robot_id))];
        self.commands_acked.add(1, &attributes);
    }

    /// Record a command nacked by a worker.
    pub fn record_nacked(&self, robot_id: &str, requeued: bool) {
        let attributes = [
            KeyValue::new("robot_id", self.robots.bucket(robot_id)),
            KeyValue::new("requeued", requeued),
        ];
        self.commands_nacked.add(1, &attributes);
    }

    /// Record an entry added to an offline buffer.
    pub fn record_buffered(&self, buffer: &str) {
        let attributes = [KeyValue::new("buffer", buffer.to_string())];
        self.commands_buffered.add(1, &attributes);
        self.buffered_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry drained from an offline buffer (sent, or permanently failed).
    pub fn record_unbuffered(&self, buffer: &str) {
        let attributes = [KeyValue::new("buffer", buffer.to_string())];
        self.commands_buffered.add(-1, &attributes);
        self.buffered_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Current number of commands held across all offline buffers.
    #[must_use]
    pub fn buffered_count(&self) -> u64 {
        self.buffered_count.load(Ordering::Relaxed)
    }

    /// Record a coordinator-driven restart attempt for `service`.
    pub fn record_restart_attempt(&self, service: &str) {
        let attributes = [KeyValue::new("service", service.to_string())];
        self.restart_attempts.add(1, &attributes);
    }

    /// Record a health check failure for `service`.
    pub fn record_health_check_failure(&self, service: &str) {
        let attributes = [KeyValue::new("service", service.to_string())];
        self.health_check_failures.add(1, &attributes);
    }
}

/// Get the OpenTelemetry meter for command metrics
fn meter() -> Meter {
    opentelemetry::global::meter("edge.commands")
}
