use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

/// Errors surfaced by the worker pool itself. A handler's own processing
/// failure is not an error here -- it's reported as `Ok(false)` and the
/// pool nacks the message; this type covers failures in the pool's own
/// plumbing (queue access, a handler that panics/errors out).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue error: {0}")]
    Queue(#[from] edge_queue::QueueError),

    #[error("command handler error: {0}")]
    Handler(String),
}
