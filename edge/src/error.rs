//! Top-level error type tying every subsystem's error enum together.
//!
//! A thin wrapper enum with `#[from]` conversions, used at the binary's
//! boundary where a subsystem failure needs to unwind `main`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigLoadError),

    #[error("queue error: {0}")]
    Queue(#[from] edge_queue::QueueError),

    #[error("worker pool error: {0}")]
    Worker(#[from] edge_worker::WorkerError),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] edge_coordinator::CoordinatorError),

    #[error("offline buffer error: {0}")]
    Offline(#[from] edge_offline::OfflineError),

    #[error("batch executor error: {0}")]
    Batch(#[from] edge_batch::BatchError),

    #[error("metrics error: {0}")]
    Metrics(#[from] edge_metrics::MetricsError),

    #[error("control socket error: {0}")]
    Control(#[from] edge_control::ControlError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EdgeError>;
