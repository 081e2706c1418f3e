//! Persistent offline buffer backed by SQLite.
//!
//! Grounded on `offline_buffer.py::OfflineBuffer` for the behaviour (buffer,
//! flush in priority/age order, expire, retry-until-failed) and on
//! `other_examples/.../retry_queue.rs.rs::RetryQueueStore` for the Rust
//! shape: a thin wrapper over `SqlitePool` using untyped `sqlx::query`/
//! `query_as` (not the `query!` macro, which needs a live database at
//! compile time) with ISO-8601 `DateTime<Utc>` columns.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use edge_common::{Message, Priority};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::{
    config::OfflineBufferConfig,
    entry::{BufferEntry, BufferEntryStatus, BufferRow},
    error::Result,
};

/// Sends a buffered message on the caller's behalf. `Ok(true)` means
/// delivered; `Ok(false)` means rejected, to be retried later up to the
/// buffer's `max_retry_count`. Trait rather than the Python source's plain
/// callable, matching `edge-worker::CommandHandler`'s shape.
#[async_trait]
pub trait BufferSink: Send + Sync {
    async fn send(&self, message: &Message) -> Result<bool>;
}

const fn priority_rank(priority: Priority) -> i64 {
    match priority {
        Priority::Low => 0,
        Priority::Normal => 1,
        Priority::High => 2,
        Priority::Urgent => 3,
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BufferStatistics {
    pub pending: i64,
    pub sending: i64,
    pub failed: i64,
    pub total_buffered: u64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_expired: u64,
    pub max_size: u32,
    pub is_online: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FlushSummary {
    pub sent: u32,
    pub failed: u32,
    pub remaining: i64,
    pub skipped_reason: Option<&'static str>,
}

pub struct OfflineBuffer {
    pool: SqlitePool,
    config: OfflineBufferConfig,
    is_online: AtomicBool,
    send_handler: RwLock<Option<Arc<dyn BufferSink>>>,
    total_buffered: AtomicU64,
    total_sent: AtomicU64,
    total_failed: AtomicU64,
    total_expired: AtomicU64,
}

impl OfflineBuffer {
    /// Open (or create) the `offline_buffer` table and its indices on
    /// `pool`. Callers typically point two instances at two separate pools
    /// or table names for the command/sync split -- see
    /// [`crate::service::OfflineBufferService`].
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub async fn new(pool: SqlitePool, config: OfflineBufferConfig) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS offline_buffer (
                id TEXT PRIMARY KEY,
                message_json TEXT NOT NULL,
                priority INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                expires_at TEXT
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_offline_buffer_status ON offline_buffer (status)")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_offline_buffer_priority_created \
             ON offline_buffer (priority DESC, created_at ASC)",
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_offline_buffer_expires_at ON offline_buffer (expires_at)")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            config,
            is_online: AtomicBool::new(false),
            send_handler: RwLock::new(None),
            total_buffered: AtomicU64::new(0),
            total_sent: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_expired: AtomicU64::new(0),
        })
    }

    pub async fn set_send_handler(&self, handler: Arc<dyn BufferSink>) {
        *self.send_handler.write().await = Some(handler);
    }

    pub fn set_online(&self, online: bool) {
        let was_online = self.is_online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::info!("offline buffer back online, will flush on next call");
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.is_online.load(Ordering::SeqCst)
    }

    /// Persist `message`, rejecting it if the buffer is at `max_size`
    /// pending entries.
    ///
    /// # Errors
    /// Returns an error on a database failure.
    pub async fn buffer(&self, message: Message, ttl: Option<ChronoDuration>) -> Result<bool> {
        let current_size = self.size().await?;
        if current_size >= i64::from(self.config.max_size) {
            tracing::warn!(
                message_id = %message.id,
                current_size,
                max_size = self.config.max_size,
                "offline buffer full, rejecting message"
            );
            return Ok(false);
        }

        let now = Utc::now();
        let ttl = ttl.unwrap_or_else(|| {
            ChronoDuration::milliseconds((self.config.default_ttl_seconds * 1000.0) as i64)
        });
        let expires_at = if ttl > ChronoDuration::zero() { Some(now + ttl) } else { None };
        let message_json = serde_json::to_string(&message)?;

        sqlx::query(
            "INSERT OR REPLACE INTO offline_buffer
                (id, message_json, priority, status, created_at, updated_at, retry_count, last_error, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?)",
        )
        .bind(&message.id)
        .bind(&message_json)
        .bind(priority_rank(message.priority))
        .bind(BufferEntryStatus::Pending.to_string())
        .bind(now)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.total_buffered.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn pending_entries(&self, limit: u32) -> Result<Vec<BufferEntry>> {
        let now = Utc::now();
        let rows: Vec<BufferRow> = sqlx::query_as(
            "SELECT id, message_json, status, created_at, updated_at, retry_count, last_error, expires_at
             FROM offline_buffer
             WHERE status = ? AND (expires_at IS NULL OR expires_at > ?)
             ORDER BY priority DESC, created_at ASC
             LIMIT ?",
        )
        .bind(BufferEntryStatus::Pending.to_string())
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_entry() {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::error!(%err, "failed to decode buffered entry, skipping"),
            }
        }
        Ok(entries)
    }

    async fn update_status(
        &self,
        id: &str,
        status: BufferEntryStatus,
        error: Option<&str>,
        retry_count: Option<u32>,
    ) -> Result<()> {
        let now = Utc::now();
        if let Some(retry_count) = retry_count {
            sqlx::query(
                "UPDATE offline_buffer SET status = ?, updated_at = ?, last_error = ?, retry_count = ? WHERE id = ?",
            )
            .bind(status.to_string())
            .bind(now)
            .bind(error)
            .bind(i64::from(retry_count))
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE offline_buffer SET status = ?, updated_at = ?, last_error = ? WHERE id = ?")
                .bind(status.to_string())
                .bind(now)
                .bind(error)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn remove_entry(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM offline_buffer WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn send_entry(&self, entry: &BufferEntry, sink: &dyn BufferSink) -> Result<bool> {
        self.update_status(&entry.id, BufferEntryStatus::Sending, None, None).await?;

        let outcome = sink.send(&entry.message).await;
        match outcome {
            Ok(true) => {
                self.remove_entry(&entry.id).await?;
                self.total_sent.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            Ok(false) => {
                self.retry_or_fail(entry, "send returned false").await
            }
            Err(err) => {
                let message = err.to_string();
                self.retry_or_fail(entry, &message).await
            }
        }
    }

    async fn retry_or_fail(&self, entry: &BufferEntry, reason: &str) -> Result<bool> {
        let retry_count = entry.retry_count + 1;
        if retry_count >= self.config.max_retry_count {
            self.update_status(&entry.id, BufferEntryStatus::Failed, Some("max retries exceeded"), Some(retry_count))
                .await?;
            self.total_failed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.update_status(&entry.id, BufferEntryStatus::Pending, Some(reason), Some(retry_count))
                .await?;
        }
        Ok(false)
    }

    /// Send every pending, unexpired entry in priority/age order while
    /// online, batch by batch. A no-op (with a `skipped_reason`) if offline
    /// or no sink is configured.
    ///
    /// # Errors
    /// Returns an error on a database failure; per-entry send failures are
    /// retried, not propagated.
    pub async fn flush(&self) -> Result<FlushSummary> {
        if !self.is_online() {
            return Ok(FlushSummary {
                skipped_reason: Some("offline"),
                ..FlushSummary::default()
            });
        }

        let sink = { self.send_handler.read().await.clone() };
        let Some(sink) = sink else {
            return Ok(FlushSummary {
                skipped_reason: Some("no_handler"),
                ..FlushSummary::default()
            });
        };

        self.cleanup_expired().await?;

        let mut sent = 0u32;
        let mut failed = 0u32;
        let mut remaining = self.size().await?;

        while remaining > 0 && self.is_online() {
            let entries = self.pending_entries(self.config.send_batch_size).await?;
            if entries.is_empty() {
                break;
            }

            for entry in &entries {
                if !self.is_online() {
                    break;
                }
                if self.send_entry(entry, sink.as_ref()).await? {
                    sent += 1;
                } else {
                    failed += 1;
                }
            }

            remaining = self.size().await?;
        }

        Ok(FlushSummary {
            sent,
            failed,
            remaining,
            skipped_reason: None,
        })
    }

    /// # Errors
    /// Returns an error on a database failure.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let result = sqlx::query("DELETE FROM offline_buffer WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        let count = result.rows_affected();
        if count > 0 {
            self.total_expired.fetch_add(count, Ordering::SeqCst);
        }
        Ok(count)
    }

    /// Number of pending (not yet sent, not expired-out) entries.
    ///
    /// # Errors
    /// Returns an error on a database failure.
    pub async fn size(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_buffer WHERE status = ?")
            .bind(BufferEntryStatus::Pending.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// # Errors
    /// Returns an error on a database failure.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM offline_buffer").execute(&self.pool).await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error on a database failure.
    pub async fn get_statistics(&self) -> Result<BufferStatistics> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM offline_buffer GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = BufferStatistics {
            total_buffered: self.total_buffered.load(Ordering::SeqCst),
            total_sent: self.total_sent.load(Ordering::SeqCst),
            total_failed: self.total_failed.load(Ordering::SeqCst),
            total_expired: self.total_expired.load(Ordering::SeqCst),
            max_size: self.config.max_size,
            is_online: self.is_online(),
            ..BufferStatistics::default()
        };

        for (status, count) in rows {
            match status.as_str() {
                "pending" => stats.pending = count,
                "sending" => stats.sending = count,
                "failed" => stats.failed = count,
                _ => {}
            }
        }

        Ok(stats)
    }
}
