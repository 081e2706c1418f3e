//! The persisted unit of the offline buffer.
//!
//! Grounded on `original_source/src/robot_service/queue/offline_buffer.py`'s
//! `BufferEntryStatus` enum and `BufferEntry` dataclass, translated to the
//! `sqlx::FromRow` row-struct idiom used by
//! `other_examples/.../retry_queue.rs.rs::RetryRow`.

use chrono::{DateTime, Utc};
use edge_common::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferEntryStatus {
    Pending,
    Sending,
    Sent,
    Failed,
    Expired,
}

impl std::fmt::Display for BufferEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for BufferEntryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown buffer entry status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferEntry {
    pub id: String,
    pub message: Message,
    pub status: BufferEntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Row shape fetched from the `offline_buffer` table. `message_json` is
/// decoded lazily via [`BufferRow::into_entry`] so a row that fails to parse
/// can be logged and skipped rather than aborting the whole fetch, matching
/// `_get_pending_entries`'s per-row try/except.
#[derive(sqlx::FromRow)]
pub(crate) struct BufferRow {
    pub id: String,
    pub message_json: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BufferRow {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(crate) fn into_entry(self) -> crate::error::Result<BufferEntry> {
        let message: Message = serde_json::from_str(&self.message_json)?;
        Ok(BufferEntry {
            id: self.id,
            message,
            status: self.status.parse().unwrap_or(BufferEntryStatus::Pending),
            created_at: self.created_at,
            updated_at: self.updated_at,
            retry_count: self.retry_count as u32,
            last_error: self.last_error,
            expires_at: self.expires_at,
        })
    }
}
