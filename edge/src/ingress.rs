//! Producer-facing command ingress: publish directly to the queue backend
//! when it's healthy, falling back to the offline command buffer when it
//! isn't.
//!
//! Grounded on `offline_queue_service.py::submit_command`'s direct-send,
//! buffer-on-failure behavior: a sticky availability flag is consulted
//! first so a broker outage doesn't cost every caller a failed publish
//! attempt; the flag is only cleared by an actual publish error, and is
//! restored by re-probing the queue's own health check.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use edge_common::{Message, Priority};
use edge_offline::OfflineBufferService;
use edge_queue::Queue;

/// Accepts raw producer payloads and routes them onto the queue or, on
/// broker unavailability, the offline command buffer.
///
/// Never fails outright: it returns `None` only when buffering itself
/// fails (buffer full, write error) -- a transient broker outage is
/// recovered locally, not surfaced to the caller.
pub struct CommandIngress {
    queue: Arc<dyn Queue>,
    offline: Arc<OfflineBufferService>,
    broker_available: AtomicBool,
}

impl CommandIngress {
    #[must_use]
    pub fn new(queue: Arc<dyn Queue>, offline: Arc<OfflineBufferService>) -> Self {
        Self {
            queue,
            offline,
            broker_available: AtomicBool::new(true),
        }
    }

    pub async fn submit_command(
        &self,
        payload: HashMap<String, serde_json::Value>,
        priority: Priority,
        trace_id: Option<String>,
        correlation_id: Option<String>,
    ) -> Option<String> {
        let message = Message::new(payload, priority).with_trace(trace_id, correlation_id);

        if self.is_broker_available().await {
            match self.queue.enqueue(message.clone()).await {
                Ok(true) => {
                    tracing::info!(message_id = %message.id, "command sent to queue service");
                    return Some(message.id);
                }
                Ok(false) => {
                    // Rejected without error (backend full): fall through to
                    // buffering without marking the broker unavailable.
                }
                Err(err) => {
                    tracing::warn!(
                        message_id = %message.id,
                        %err,
                        "failed to send to queue service, buffering"
                    );
                    self.broker_available.store(false, Ordering::SeqCst);
                }
            }
        }

        match self.offline.buffer_command(message.clone()).await {
            Ok(true) => {
                tracing::info!(
                    message_id = %message.id,
                    "command buffered (queue service unavailable)"
                );
                Some(message.id)
            }
            Ok(false) => {
                tracing::error!(message_id = %message.id, "failed to buffer command");
                None
            }
            Err(err) => {
                tracing::error!(message_id = %message.id, %err, "failed to buffer command");
                None
            }
        }
    }

    /// Once the flag has flipped unavailable, re-probe before every attempt
    /// rather than waiting on a separate periodic task; this keeps recovery
    /// self-contained in the ingress, at the cost of one extra health check
    /// per submission during an outage.
    async fn is_broker_available(&self) -> bool {
        if self.broker_available.load(Ordering::SeqCst) {
            return true;
        }

        let healthy = self
            .queue
            .health_check()
            .await
            .map(|report| report.is_healthy())
            .unwrap_or(false);
        self.broker_available.store(healthy, Ordering::SeqCst);
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edge_offline::OfflineServiceConfig;
    use edge_queue::HealthReport;
    use serde_json::json;
    use sqlx::SqlitePool;
    use std::sync::atomic::AtomicBool as StdAtomicBool;
    use std::time::Duration;

    struct StubQueue {
        enqueue_result: Result<bool, edge_queue::QueueError>,
        healthy: StdAtomicBool,
    }

    impl StubQueue {
        fn ok() -> Self {
            Self {
                enqueue_result: Ok(true),
                healthy: StdAtomicBool::new(true),
            }
        }

        fn failing() -> Self {
            Self {
                enqueue_result: Err(edge_queue::QueueError::Cloud("broker down".to_string())),
                healthy: StdAtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Queue for StubQueue {
        async fn enqueue(&self, _message: Message) -> edge_queue::Result<bool> {
            match &self.enqueue_result {
                Ok(b) => Ok(*b),
                Err(_) => Err(edge_queue::QueueError::Cloud("broker down".to_string())),
            }
        }

        async fn dequeue(&self, _timeout: Option<Duration>) -> edge_queue::Result<Option<Message>> {
            Ok(None)
        }

        async fn peek(&self) -> edge_queue::Result<Option<Message>> {
            Ok(None)
        }

        async fn ack(&self, _id: &str) -> edge_queue::Result<bool> {
            Ok(true)
        }

        async fn nack(&self, _id: &str, _requeue: bool) -> edge_queue::Result<bool> {
            Ok(true)
        }

        async fn size(&self) -> edge_queue::Result<usize> {
            Ok(0)
        }

        async fn clear(&self) -> edge_queue::Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> edge_queue::Result<HealthReport> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(HealthReport::healthy("stub"))
            } else {
                Ok(HealthReport::unhealthy("stub", "still down"))
            }
        }
    }

    async fn offline_service() -> Arc<OfflineBufferService> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");
        Arc::new(
            OfflineBufferService::new("offline-buffer", pool, OfflineServiceConfig::default())
                .await
                .expect("schema init"),
        )
    }

    #[tokio::test]
    async fn direct_publish_succeeds_when_broker_is_available() {
        let queue: Arc<dyn Queue> = Arc::new(StubQueue::ok());
        let ingress = CommandIngress::new(queue, offline_service().await);

        let id = ingress
            .submit_command(
                HashMap::from([("action_name".to_string(), json!("wave"))]),
                Priority::Normal,
                None,
                None,
            )
            .await;
        assert!(id.is_some());
    }

    #[tokio::test]
    async fn publish_failure_falls_back_to_the_offline_buffer() {
        let queue: Arc<dyn Queue> = Arc::new(StubQueue::failing());
        let ingress = CommandIngress::new(queue, offline_service().await);

        let id = ingress
            .submit_command(
                HashMap::from([("action_name".to_string(), json!("wave"))]),
                Priority::High,
                Some("trace-1".to_string()),
                None,
            )
            .await;
        assert!(id.is_some());

        let stats = ingress
            .offline
            .command_buffer()
            .get_statistics()
            .await
            .expect("stats");
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn broker_marked_unavailable_after_a_failed_publish_is_skipped_until_health_recovers() {
        let stub = Arc::new(StubQueue::failing());
        let queue: Arc<dyn Queue> = stub.clone();
        let ingress = CommandIngress::new(queue, offline_service().await);

        ingress
            .submit_command(HashMap::new(), Priority::Normal, None, None)
            .await;
        assert!(!ingress.broker_available.load(Ordering::SeqCst));

        // Health recovers, but enqueue_result still reflects failure since
        // the stub was built as "failing"; the flag re-probes via
        // health_check independently of enqueue behavior.
        stub.healthy.store(true, Ordering::SeqCst);
        let recovered = ingress.is_broker_available().await;
        assert!(recovered);
    }
}
