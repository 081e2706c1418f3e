//! Priority queue contract and backends (in-process, AMQP, cloud) for
//! robot commands.

pub mod backends;
pub mod config;
pub mod error;
pub mod queue;

pub use backends::{AmqpQueue, CloudQueue, MemoryQueue};
pub use config::{AmqpConfig, CloudConfig, QueueConfig, QueueType};
pub use error::{QueueError, Result};
pub use queue::{HealthReport, Queue};

/// Construct the configured backend behind a single trait object, so
/// callers (the worker pool, the CLI) never branch on `QueueType` directly.
pub async fn build(config: &QueueConfig) -> Result<Box<dyn Queue>> {
    match config.queue_type {
        QueueType::Memory => Ok(Box::new(MemoryQueue::new(config.max_size))),
        QueueType::Amqp => {
            let amqp = config
                .amqp
                .as_ref()
                .ok_or(QueueError::Unsupported("amqp queue_type requires [queue.amqp]"))?;
            Ok(Box::new(AmqpQueue::connect(amqp).await?))
        }
        QueueType::Cloud => {
            let cloud = config
                .cloud
                .as_ref()
                .ok_or(QueueError::Unsupported("cloud queue_type requires [queue.cloud]"))?;
            Ok(Box::new(CloudQueue::connect(cloud).await?))
        }
    }
}
