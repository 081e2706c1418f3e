//! Top-level orchestration: wires every subsystem crate together and runs
//! them until a shutdown signal arrives.
//!
//! One struct owns the whole configured system; a `tokio::select!` races
//! every subsystem's `serve`/run future against a `SHUTDOWN_BROADCAST`
//! static and its `shutdown()` signal-handling function.

use std::{sync::LazyLock, sync::Arc, time::Duration};

use edge_common::{log::Logger, Signal};
use edge_control::ControlServer;
use edge_coordinator::{HealthServer, ServiceConfig, ServiceCoordinator};
use edge_offline::OfflineBufferService;
use edge_queue::Queue;
use edge_tracing::traced;
use edge_worker::QueueHandler;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::broadcast;

use crate::{
    config::EdgeConfig,
    control_handler::EdgeControlHandler,
    dispatcher::{CommandDispatchHandler, LoggingDispatcher},
    error::Result,
    ingress::CommandIngress,
    service_adapters::{BatchExecutorService, WorkerPoolService},
};

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

#[traced(instrument(level = tracing::Level::TRACE))]
async fn shutdown() {
    let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(err) => {
            tracing::error!(%err, "failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
        }
        _ = terminate.recv() => {
            tracing::info!("SIGTERM received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    if SHUTDOWN_BROADCAST.send(Signal::Shutdown).is_err() {
        tracing::debug!("shutdown broadcast has no subscribers");
        return;
    }

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!(?s, "subsystem acknowledged shutdown"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(err) => tracing::debug!(%err, "shutdown broadcast lagged"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }
}

/// Owns every subsystem once constructed and runs them until shutdown.
pub struct Edge {
    config: EdgeConfig,
}

impl Edge {
    #[must_use]
    pub fn new(config: EdgeConfig) -> Self {
        Self { config }
    }

    /// Construct, register, and start every subsystem, then run until a
    /// shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if any subsystem fails to initialise (queue
    /// backend connection, offline database, control socket bind, health
    /// server bind) or if a subsystem's run loop returns an error.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, err), timing(precision = "s"))]
    pub async fn run(self) -> Result<()> {
        Logger::init();
        tracing::info!("edge controller starting");

        let queue: Arc<dyn Queue> = Arc::from(edge_queue::build(&self.config.queue).await?);

        let worker_handler = Arc::new(CommandDispatchHandler::new(LoggingDispatcher));
        let queue_handler = Arc::new(QueueHandler::new(
            Arc::clone(&queue),
            worker_handler,
            self.config.queue.max_workers,
            Duration::from_secs_f64(self.config.queue.poll_interval_seconds),
        ));

        let connect_options = SqliteConnectOptions::new()
            .filename(&self.config.offline.database_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_options).await?;
        let offline = Arc::new(
            OfflineBufferService::new("offline-buffer", pool, self.config.offline.service.clone()).await?,
        );

        let result_store = Arc::new(edge_batch::InMemoryResultStore::new());
        let batch_executor = Arc::new(edge_batch::BatchExecutor::new(
            Arc::clone(&queue),
            result_store,
            self.config.batch.max_parallel,
        ));

        let coordinator = Arc::new(ServiceCoordinator::new(self.config.coordinator.clone()));
        coordinator
            .register_service(
                Arc::new(WorkerPoolService::new(
                    "worker-pool",
                    Arc::clone(&queue_handler),
                    Duration::from_secs(10),
                )),
                ServiceConfig::new("worker-pool", "worker_pool"),
            )
            .await?;
        coordinator
            .register_service(Arc::clone(&offline), ServiceConfig::new("offline-buffer", "offline_buffer"))
            .await?;
        coordinator
            .register_service(
                Arc::new(BatchExecutorService::new("batch-executor", Arc::clone(&batch_executor))),
                ServiceConfig::new("batch-executor", "batch_executor"),
            )
            .await?;

        edge_metrics::init_metrics(&self.config.metrics)?;

        coordinator.start().await?;

        let ingress = Arc::new(CommandIngress::new(Arc::clone(&queue), Arc::clone(&offline)));

        let control_handler = Arc::new(EdgeControlHandler::new(
            Arc::clone(&queue),
            Arc::clone(&coordinator),
            Arc::clone(&offline),
            Arc::clone(&ingress),
        ));
        let control_server = ControlServer::new(self.config.control.socket_path.clone(), control_handler)?
            .with_auth(self.config.control.auth.clone());

        let health_server = if self.config.coordinator.http.enabled {
            Some(HealthServer::new(&self.config.coordinator.http, Arc::clone(&coordinator)).await?)
        } else {
            None
        };

        let ret = tokio::select! {
            r = control_server.serve(SHUTDOWN_BROADCAST.subscribe()) => r.map_err(Into::into),
            r = run_health_server(health_server, SHUTDOWN_BROADCAST.subscribe()) => r,
            () = shutdown() => Ok(()),
        };

        tracing::info!("shutting down subsystems");
        coordinator.stop(Some(Duration::from_secs(10))).await?;

        ret
    }
}

async fn run_health_server(
    server: Option<HealthServer>,
    shutdown: broadcast::Receiver<Signal>,
) -> Result<()> {
    match server {
        Some(server) => server.serve(shutdown).await.map_err(Into::into),
        None => std::future::pending().await,
    }
}
