use thiserror::Error;

pub type Result<T> = std::result::Result<T, BatchError>;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("queue error: {0}")]
    Queue(#[from] edge_queue::QueueError),
}
