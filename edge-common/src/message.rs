//! The unit that traverses the queue: [`Message`], its [`Priority`], and the
//! normalized [`CommandSpec`] a `CommandProcessor` produces from it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Total order URGENT > HIGH > NORMAL > LOW. Derived `Ord` follows
/// declaration order, so variants are listed low-to-high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// All variants, highest first -- the order backends must drain in.
    pub const DESCENDING: [Priority; 4] =
        [Priority::Urgent, Priority::High, Priority::Normal, Priority::Low];

    /// Broker priority used by the AMQP backend's `x-max-priority: 10` queue.
    #[must_use]
    pub const fn amqp_priority(self) -> u8 {
        match self {
            Priority::Low => 2,
            Priority::Normal => 5,
            Priority::High => 8,
            Priority::Urgent => 10,
        }
    }

    /// Lowercase routing-key suffix, e.g. `command.urgent`.
    #[must_use]
    pub const fn routing_key_suffix(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

fn default_max_retries() -> u32 {
    3
}

/// The unit that traverses the queue.
///
/// `id` is a ULID so that lexicographic ordering tracks creation order, the
/// same property `edge-queue`'s backends rely on for FIFO-within-priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub payload: HashMap<String, serde_json::Value>,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub trace_id: Option<String>,
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    pub timeout_seconds: Option<f64>,
}

impl Message {
    #[must_use]
    pub fn new(payload: HashMap<String, serde_json::Value>, priority: Priority) -> Self {
        Self {
            id: Ulid::new().to_string(),
            payload,
            priority,
            timestamp: Utc::now(),
            trace_id: None,
            correlation_id: None,
            retry_count: 0,
            max_retries: default_max_retries(),
            timeout_seconds: None,
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace_id: Option<String>, correlation_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self.correlation_id = correlation_id;
        self
    }

    /// Whether a nack-with-requeue is still permitted for this message.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Normalized command produced by a parser (LLM, TUI, HTTP, batch file) and
/// wrapped in a [`Message`] for transport. `params` always carries either
/// `action_name` (+ optional `duration_ms`) or an `actions` sequence by the
/// time a [`crate::command::CommandProcessor`] has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub robot_id: String,
    pub params: HashMap<String, serde_json::Value>,
    pub priority: Priority,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_total_order() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn message_ids_are_unique_and_sortable() {
        let a = Message::new(HashMap::new(), Priority::Normal);
        let b = Message::new(HashMap::new(), Priority::Normal);
        assert_ne!(a.id, b.id);
        assert!(a.id < b.id, "ULIDs generated in order should sort in order");
    }

    #[test]
    fn can_retry_respects_max_retries() {
        let mut msg = Message::new(HashMap::new(), Priority::Low);
        msg.max_retries = 2;
        assert!(msg.can_retry());
        msg.retry_count = 2;
        assert!(!msg.can_retry());
    }
}
