//! Queue handler worker pool.
//!
//! A `tokio::select!`-driven run loop with graceful shutdown: a `Signal`
//! broadcast tells workers to stop pulling new work, in-flight work
//! finishes, a bounded drain wait gives stragglers a chance, and anything
//! still running past that is cancelled.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use edge_common::{Message, Signal};
use edge_queue::{HealthReport, Queue};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::error::Result;

/// User-supplied command dispatch. Returns `Ok(true)` on success (acked),
/// `Ok(false)` on a handled failure (nacked with requeue), and `Err` for an
/// unexpected failure (logged, then nacked with requeue).
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<bool>;
}

/// Launches `max_workers` cooperative workers pulling from a [`Queue`] and
/// dispatching to a [`CommandHandler`].
pub struct QueueHandler {
    queue: Arc<dyn Queue>,
    handler: Arc<dyn CommandHandler>,
    max_workers: u32,
    poll_interval: Duration,
    shutdown_tx: broadcast::Sender<Signal>,
    active_workers: Arc<AtomicUsize>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl QueueHandler {
    #[must_use]
    pub fn new(
        queue: Arc<dyn Queue>,
        handler: Arc<dyn CommandHandler>,
        max_workers: u32,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(max_workers.max(1) as usize + 1);
        Self {
            queue,
            handler,
            max_workers,
            poll_interval,
            shutdown_tx,
            active_workers: Arc::new(AtomicUsize::new(0)),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Launch the configured number of workers. Idempotent only in the
    /// sense that calling it twice launches a second fleet against the same
    /// queue; callers are expected to call this once per handler instance.
    pub async fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;
        for worker_id in 0..self.max_workers {
            let this = Arc::clone(self);
            let shutdown_rx = this.shutdown_tx.subscribe();
            tasks.push(tokio::spawn(this.worker_loop(worker_id, shutdown_rx)));
        }
    }

    async fn worker_loop(
        self: Arc<Self>,
        worker_id: u32,
        mut shutdown: broadcast::Receiver<Signal>,
    ) {
        tracing::debug!(worker_id, "worker started");
        loop {
            tokio::select! {
                biased;
                signal = shutdown.recv() => {
                    match signal {
                        Ok(Signal::Shutdown | Signal::Finalised) | Err(_) => break,
                    }
                }
                dequeued = self.queue.dequeue(Some(self.poll_interval)) => {
                    match dequeued {
                        Ok(Some(message)) => self.process_one(message).await,
                        Ok(None) => {}
                        Err(err) => {
                            tracing::error!(worker_id, %err, "queue dequeue error");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
        tracing::debug!(worker_id, "worker stopped");
    }

    async fn process_one(&self, message: Message) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
        let id = message.id.clone();

        let outcome = self.handler.handle(&message).await;

        let ack_result = match outcome {
            Ok(true) => self.queue.ack(&id).await,
            Ok(false) => self.queue.nack(&id, true).await,
            Err(err) => {
                tracing::error!(message_id = %id, %err, "command handler error");
                self.queue.nack(&id, true).await
            }
        };

        if let Err(err) = ack_result {
            tracing::error!(message_id = %id, %err, "failed to ack/nack message");
        }

        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Signal shutdown, wait up to `timeout` for all workers to drain, then
    /// cancel any stragglers. A cancelled worker's in-flight message is left
    /// in the backend's in-flight set and becomes visible again once its
    /// lease expires or via explicit nack on restart.
    pub async fn stop(&self, timeout: Duration) {
        let _ = self.shutdown_tx.send(Signal::Shutdown);

        let mut handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().await;
            tasks.drain(..).collect()
        };

        let joined = tokio::time::timeout(timeout, async {
            for handle in &mut handles {
                if let Err(err) = handle.await {
                    if err.is_panic() {
                        tracing::error!("worker task panicked: {err}");
                    }
                }
            }
        })
        .await;

        if joined.is_err() {
            tracing::warn!(
                "worker pool shutdown timed out after {:.1}s; aborting stragglers",
                timeout.as_secs_f64()
            );
            for handle in &handles {
                handle.abort();
            }
        }
    }

    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub async fn health_check(&self) -> Result<HealthReport> {
        let mut report = self.queue.health_check().await?;
        report
            .detail
            .insert("active_workers".to_string(), self.active_workers().into());
        report
            .detail
            .insert("max_workers".to_string(), self.max_workers.into());
        Ok(report)
    }
}
