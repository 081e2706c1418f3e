use serde::Deserialize;

/// Per-buffer settings, grounded on `OfflineBuffer.__init__`'s keyword
/// defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineBufferConfig {
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: f64,
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,
    #[serde(default = "default_send_batch_size")]
    pub send_batch_size: u32,
}

impl Default for OfflineBufferConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            default_ttl_seconds: default_ttl(),
            max_retry_count: default_max_retry_count(),
            send_batch_size: default_send_batch_size(),
        }
    }
}

const fn default_max_size() -> u32 {
    1000
}
const fn default_ttl() -> f64 {
    3600.0
}
const fn default_max_retry_count() -> u32 {
    3
}
const fn default_send_batch_size() -> u32 {
    10
}

/// Settings for the [`crate::service::OfflineBufferService`] wrapping the
/// command and sync buffers, grounded on `OfflineQueueService.__init__`.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineServiceConfig {
    #[serde(default)]
    pub command_buffer: OfflineBufferConfig,
    #[serde(default)]
    pub sync_buffer: OfflineBufferConfig,
    #[serde(default = "default_true")]
    pub auto_flush_on_online: bool,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_seconds: f64,
}

impl Default for OfflineServiceConfig {
    fn default() -> Self {
        Self {
            command_buffer: OfflineBufferConfig::default(),
            sync_buffer: OfflineBufferConfig::default(),
            auto_flush_on_online: default_true(),
            flush_interval_seconds: default_flush_interval(),
        }
    }
}

const fn default_true() -> bool {
    true
}
const fn default_flush_interval() -> f64 {
    5.0
}
