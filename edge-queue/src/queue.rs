use std::time::Duration;

use async_trait::async_trait;
use edge_common::Message;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Backend-reported health, returned by every [`Queue::health_check`].
///
/// `status` is deliberately a bare string rather than a closed enum: the
/// coordinator (see `edge-coordinator`) treats both `"healthy"` and
/// `"running"` as healthy, and different backends report different extra
/// detail in `detail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub backend: &'static str,
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl HealthReport {
    #[must_use]
    pub fn healthy(backend: &'static str) -> Self {
        Self {
            status: "healthy".to_string(),
            backend,
            detail: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn unhealthy(backend: &'static str, reason: impl Into<String>) -> Self {
        let mut detail = serde_json::Map::new();
        detail.insert("error".to_string(), serde_json::Value::String(reason.into()));
        Self {
            status: "unhealthy".to_string(),
            backend,
            detail,
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "running")
    }
}

/// Polymorphic priority-queue contract every backend (in-process, AMQP,
/// cloud) implements identically, per the component design's §4.1 priority
/// queue contract.
///
/// Invariant held by every implementation: a dequeued message is not
/// observable to other consumers until it is nacked-with-requeue or its
/// visibility lease expires.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue a message. Returns `false` if a bounded backend is full or
    /// the backend rejects the publish.
    async fn enqueue(&self, message: edge_common::Message) -> Result<bool>;

    /// Dequeue the highest-priority waiting message, FIFO within a
    /// priority class. `timeout = Some(Duration::ZERO)` is non-blocking.
    /// `timeout = None` waits indefinitely until a message arrives or the
    /// backend is shut down.
    async fn dequeue(&self, timeout: Option<Duration>) -> Result<Option<Message>>;

    /// Best-effort, non-destructive look at the next message. Backends
    /// that cannot peek natively implement it as dequeue-then-requeue;
    /// callers MUST NOT rely on exactly-once peek semantics.
    async fn peek(&self) -> Result<Option<Message>>;

    /// Confirm successful processing. Idempotent: acking an id that is not
    /// in flight returns `false` without error.
    async fn ack(&self, id: &str) -> Result<bool>;

    /// Report failure. If `requeue` and the message's retry budget is not
    /// exhausted, it's incremented and re-enqueued preserving priority;
    /// otherwise it's discarded (routed to dead-letter where supported).
    async fn nack(&self, id: &str, requeue: bool) -> Result<bool>;

    async fn size(&self) -> Result<usize>;

    async fn clear(&self) -> Result<()>;

    async fn health_check(&self) -> Result<HealthReport>;
}
