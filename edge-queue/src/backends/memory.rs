//! In-process priority queue backend: one ordered bucket per priority
//! class, guarded by a mutex, with a `Notify` waking any blocked `dequeue`.
//!
//! Ported from the reference `MemoryQueue`, which clears its wake event
//! from inside `dequeue` after a successful pop -- a pattern that can miss
//! a wakeup if an `enqueue` lands between a waiter's last failed check and
//! the moment it starts waiting. This implementation instead creates the
//! `Notify` future *before* re-checking the buckets (see [`MemoryQueue::dequeue`]),
//! so any `notify_one` issued after that point -- including one that races
//! with the check -- is not lost.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use edge_common::{Message, Priority};
use tokio::sync::Notify;

use crate::{
    error::Result,
    queue::{HealthReport, Queue},
};

#[derive(Default)]
struct Stats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
}

struct State {
    buckets: HashMap<Priority, VecDeque<Message>>,
    in_flight: HashMap<String, Message>,
}

impl State {
    fn new() -> Self {
        let mut buckets = HashMap::new();
        for priority in Priority::DESCENDING {
            buckets.insert(priority, VecDeque::new());
        }
        Self {
            buckets,
            in_flight: HashMap::new(),
        }
    }

    fn total_len(&self) -> usize {
        self.buckets.values().map(VecDeque::len).sum()
    }

    fn pop_highest(&mut self) -> Option<Message> {
        for priority in Priority::DESCENDING {
            if let Some(bucket) = self.buckets.get_mut(&priority) {
                if let Some(msg) = bucket.pop_front() {
                    self.in_flight.insert(msg.id.clone(), msg.clone());
                    return Some(msg);
                }
            }
        }
        None
    }
}

/// Bounded-or-unbounded in-process priority queue. No persistence: state
/// is lost on process restart, which is why the offline buffer exists as a
/// separate subsystem rather than a feature of this backend.
pub struct MemoryQueue {
    state: Mutex<State>,
    notify: Notify,
    max_size: Option<usize>,
    stats: Stats,
}

impl MemoryQueue {
    #[must_use]
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State::new()),
            notify: Notify::new(),
            max_size,
            stats: Stats::default(),
        }
    }

    fn try_dequeue(&self) -> Option<Message> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        let msg = state.pop_highest();
        if msg.is_some() {
            self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        msg
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn enqueue(&self, message: Message) -> Result<bool> {
        {
            let mut state = self.state.lock().expect("queue mutex poisoned");
            if let Some(max) = self.max_size {
                if state.total_len() >= max {
                    return Ok(false);
                }
            }
            state
                .buckets
                .entry(message.priority)
                .or_default()
                .push_back(message);
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        Ok(true)
    }

    async fn dequeue(&self, timeout: Option<Duration>) -> Result<Option<Message>> {
        if timeout == Some(Duration::ZERO) {
            return Ok(self.try_dequeue());
        }

        loop {
            // Register interest *before* re-checking state so an enqueue
            // that races with this check still wakes us.
            let notified = self.notify.notified();

            if let Some(msg) = self.try_dequeue() {
                return Ok(Some(msg));
            }

            match timeout {
                None => notified.await,
                Some(d) => {
                    if tokio::time::timeout(d, notified).await.is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn peek(&self) -> Result<Option<Message>> {
        let state = self.state.lock().expect("queue mutex poisoned");
        for priority in Priority::DESCENDING {
            if let Some(msg) = state.buckets.get(&priority).and_then(|b| b.front()) {
                return Ok(Some(msg.clone()));
            }
        }
        Ok(None)
    }

    async fn ack(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        let removed = state.in_flight.remove(id).is_some();
        if removed {
            self.stats.acked.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    async fn nack(&self, id: &str, requeue: bool) -> Result<bool> {
        let mut requeued = false;
        {
            let mut state = self.state.lock().expect("queue mutex poisoned");
            let Some(mut msg) = state.in_flight.remove(id) else {
                return Ok(false);
            };
            self.stats.nacked.fetch_add(1, Ordering::Relaxed);

            if requeue && msg.can_retry() {
                msg.retry_count += 1;
                state.buckets.entry(msg.priority).or_default().push_back(msg);
                requeued = true;
            }
        }
        if requeued {
            self.notify.notify_one();
        }
        Ok(true)
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.state.lock().expect("queue mutex poisoned").total_len())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        for bucket in state.buckets.values_mut() {
            bucket.clear();
        }
        state.in_flight.clear();
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthReport> {
        let mut report = HealthReport::healthy("memory");
        let state = self.state.lock().expect("queue mutex poisoned");

        let mut sizes = serde_json::Map::new();
        for priority in Priority::DESCENDING {
            let len = state.buckets.get(&priority).map_or(0, VecDeque::len);
            sizes.insert(format!("{priority:?}").to_uppercase(), len.into());
        }

        report.detail.insert("queue_sizes".into(), sizes.into());
        report
            .detail
            .insert("in_flight_count".into(), state.in_flight.len().into());
        report.detail.insert("total_size".into(), state.total_len().into());
        report.detail.insert(
            "max_size".into(),
            self.max_size.map_or(serde_json::Value::Null, Into::into),
        );

        let mut statistics = serde_json::Map::new();
        statistics.insert(
            "total_enqueued".into(),
            self.stats.enqueued.load(Ordering::Relaxed).into(),
        );
        statistics.insert(
            "total_dequeued".into(),
            self.stats.dequeued.load(Ordering::Relaxed).into(),
        );
        statistics.insert("total_acked".into(), self.stats.acked.load(Ordering::Relaxed).into());
        statistics.insert(
            "total_nacked".into(),
            self.stats.nacked.load(Ordering::Relaxed).into(),
        );
        report.detail.insert("statistics".into(), statistics.into());

        Ok(report)
    }
}
