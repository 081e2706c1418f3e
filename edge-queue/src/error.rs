use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors surfaced by a [`crate::Queue`] backend.
///
/// Per-message publish/consume failures are mostly swallowed into `bool`
/// return values at the trait boundary (transient broker errors are
/// treated as nack-and-retry, not propagated exceptions); this type covers
/// the failures that can't be absorbed that way -- connection setup,
/// topology declaration, and serialization.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("AMQP connection error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("cloud queue error: {0}")]
    Cloud(String),

    #[error("failed to (de)serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend does not support this operation: {0}")]
    Unsupported(&'static str),

    #[error("queue configuration error: {0}")]
    Config(#[from] edge_common::error::ConfigError),
}

impl QueueError {
    /// Broker-level failures are transient by construction: the queue
    /// handler's job is to keep retrying, not to treat them as fatal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Amqp(_) | Self::Cloud(_))
    }
}
