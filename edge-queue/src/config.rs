//! Recognized queue configuration options.

use serde::{Deserialize, Serialize};

mod defaults {
    pub const fn max_workers() -> u32 {
        5
    }
    pub const fn poll_interval_seconds() -> f64 {
        0.1
    }
    pub const fn prefetch_count() -> u16 {
        10
    }
    pub const fn connection_pool_size() -> u32 {
        4
    }
    pub const fn channel_pool_size() -> u32 {
        8
    }
    pub const fn visibility_timeout() -> u32 {
        30
    }
    pub const fn wait_time_seconds() -> u32 {
        20
    }
    pub const fn max_receive_count() -> i32 {
        5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Memory,
    Amqp,
    Cloud,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub queue_type: QueueType,
    pub max_size: Option<usize>,
    #[serde(default = "defaults::max_workers")]
    pub max_workers: u32,
    #[serde(default = "defaults::poll_interval_seconds")]
    pub poll_interval_seconds: f64,
    #[serde(default)]
    pub amqp: Option<AmqpConfig>,
    #[serde(default)]
    pub cloud: Option<CloudConfig>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_type: QueueType::Memory,
            max_size: None,
            max_workers: defaults::max_workers(),
            poll_interval_seconds: defaults::poll_interval_seconds(),
            amqp: None,
            cloud: None,
        }
    }
}

/// AMQP topology: topic exchange `robot.commands`,
/// durable queue `robot.commands.queue` with `x-max-priority: 10`, DLX
/// `robot.commands.dlx` bound to DLQ `robot.commands.dlq` with key `#`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmqpConfig {
    pub url: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_queue")]
    pub queue: String,
    #[serde(default = "default_dlx")]
    pub dlx: String,
    #[serde(default = "default_dlq")]
    pub dlq: String,
    #[serde(default = "defaults::prefetch_count")]
    pub prefetch_count: u16,
    #[serde(default = "defaults::connection_pool_size")]
    pub connection_pool_size: u32,
    #[serde(default = "defaults::channel_pool_size")]
    pub channel_pool_size: u32,
}

fn default_exchange() -> String {
    "robot.commands".to_string()
}
fn default_queue() -> String {
    "robot.commands.queue".to_string()
}
fn default_dlx() -> String {
    "robot.commands.dlx".to_string()
}
fn default_dlq() -> String {
    "robot.commands.dlq".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub queue_url: Option<String>,
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    #[serde(default = "default_dlq_name")]
    pub dlq_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "defaults::visibility_timeout")]
    pub visibility_timeout: u32,
    #[serde(default = "defaults::wait_time_seconds")]
    pub wait_time_seconds: u32,
    #[serde(default)]
    pub use_fifo: bool,
    /// `maxReceiveCount` on the main queue's redrive policy: how many times
    /// SQS will redeliver a message before routing it to the dead-letter
    /// queue on its own, independent of this client's own `nack` retry
    /// accounting (a backstop for messages whose consumer never calls back).
    #[serde(default = "defaults::max_receive_count")]
    pub max_receive_count: i32,
}

fn default_queue_name() -> String {
    "robot-edge-commands-queue".to_string()
}
fn default_dlq_name() -> String {
    "robot-edge-commands-dlq".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
