//! Supervises the command and sync offline buffers as one
//! [`edge_coordinator::ManagedService`], grounded on
//! `offline_queue_service.py::OfflineQueueService`'s pairing of a command
//! buffer and a sync buffer behind one periodic-flush loop.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use edge_common::{Message, Signal};
use edge_coordinator::{ManagedService, ServiceHealth};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex};

use crate::{
    buffer::{BufferSink, OfflineBuffer},
    config::OfflineServiceConfig,
    error::Result,
};

struct Inner {
    name: String,
    command_buffer: Arc<OfflineBuffer>,
    sync_buffer: Arc<OfflineBuffer>,
    auto_flush_on_online: bool,
    flush_interval: Duration,
    shutdown_tx: broadcast::Sender<Signal>,
    flush_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Inner {
    async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<Signal>) {
        loop {
            tokio::select! {
                biased;
                signal = shutdown.recv() => {
                    match signal {
                        Ok(Signal::Shutdown | Signal::Finalised) | Err(_) => break,
                    }
                }
                () = tokio::time::sleep(self.flush_interval) => {
                    if let Err(err) = self.command_buffer.flush().await {
                        tracing::error!(%err, "command buffer flush failed");
                    }
                    if let Err(err) = self.sync_buffer.flush().await {
                        tracing::error!(%err, "sync buffer flush failed");
                    }
                }
            }
        }
    }
}

/// A cheaply-clonable handle: internals live behind an `Arc` so
/// [`ManagedService::start`] can spawn a `'static` flush-loop task from a
/// plain `&self` call without unsafe lifetime extension.
pub struct OfflineBufferService(Arc<Inner>);

impl OfflineBufferService {
    /// # Errors
    /// Returns an error if either buffer's schema creation fails.
    pub async fn new(name: impl Into<String>, pool: SqlitePool, config: OfflineServiceConfig) -> Result<Self> {
        let command_buffer = Arc::new(OfflineBuffer::new(pool.clone(), config.command_buffer).await?);
        let sync_buffer = Arc::new(OfflineBuffer::new(pool, config.sync_buffer).await?);
        let (shutdown_tx, _) = broadcast::channel(4);
        Ok(Self(Arc::new(Inner {
            name: name.into(),
            command_buffer,
            sync_buffer,
            auto_flush_on_online: config.auto_flush_on_online,
            flush_interval: Duration::from_secs_f64(config.flush_interval_seconds),
            shutdown_tx,
            flush_task: Mutex::new(None),
        })))
    }

    #[must_use]
    pub fn command_buffer(&self) -> &Arc<OfflineBuffer> {
        &self.0.command_buffer
    }

    #[must_use]
    pub fn sync_buffer(&self) -> &Arc<OfflineBuffer> {
        &self.0.sync_buffer
    }

    pub async fn set_command_sink(&self, sink: Arc<dyn BufferSink>) {
        self.0.command_buffer.set_send_handler(sink).await;
    }

    pub async fn set_sync_sink(&self, sink: Arc<dyn BufferSink>) {
        self.0.sync_buffer.set_send_handler(sink).await;
    }

    /// Mark both buffers online/offline, flushing immediately on the
    /// offline-to-online edge when `auto_flush_on_online` is set --
    /// grounded on `_on_connection_status_changed`'s
    /// `set_online`-then-`flush_command_buffer` pairing.
    pub async fn set_online(&self, online: bool) -> Result<()> {
        let was_online = self.0.command_buffer.is_online();
        self.0.command_buffer.set_online(online);
        self.0.sync_buffer.set_online(online);

        if online && !was_online && self.0.auto_flush_on_online {
            self.0.command_buffer.flush().await?;
            self.0.sync_buffer.flush().await?;
        }
        Ok(())
    }

    pub async fn buffer_command(&self, message: Message) -> Result<bool> {
        self.0.command_buffer.buffer(message, None).await
    }
}

#[async_trait]
impl ManagedService for OfflineBufferService {
    fn name(&self) -> &str {
        &self.0.name
    }

    async fn start(&self) -> edge_coordinator::Result<bool> {
        self.0
            .command_buffer
            .cleanup_expired()
            .await
            .map_err(|e| edge_coordinator::CoordinatorError::Service(e.to_string()))?;
        self.0
            .sync_buffer
            .cleanup_expired()
            .await
            .map_err(|e| edge_coordinator::CoordinatorError::Service(e.to_string()))?;

        let shutdown_rx = self.0.shutdown_tx.subscribe();
        let inner = Arc::clone(&self.0);
        let handle = tokio::spawn(inner.run(shutdown_rx));
        *self.0.flush_task.lock().await = Some(handle);
        Ok(true)
    }

    async fn stop(&self, _timeout: Duration) -> edge_coordinator::Result<bool> {
        let _ = self.0.shutdown_tx.send(Signal::Shutdown);
        if let Some(handle) = self.0.flush_task.lock().await.take() {
            let _ = handle.await;
        }
        Ok(true)
    }

    async fn health_check(&self) -> edge_coordinator::Result<ServiceHealth> {
        let command_stats = self
            .0
            .command_buffer
            .get_statistics()
            .await
            .map_err(|e| edge_coordinator::CoordinatorError::Service(e.to_string()))?;
        let sync_stats = self
            .0
            .sync_buffer
            .get_statistics()
            .await
            .map_err(|e| edge_coordinator::CoordinatorError::Service(e.to_string()))?;

        let mut detail = serde_json::Map::new();
        detail.insert("command_buffer".to_string(), serde_json::json!(command_stats));
        detail.insert("sync_buffer".to_string(), serde_json::json!(sync_stats));

        Ok(ServiceHealth {
            status: "healthy".to_string(),
            detail,
        })
    }

    fn is_running(&self) -> bool {
        self.0
            .flush_task
            .try_lock()
            .is_ok_and(|guard| guard.is_some())
    }
}
