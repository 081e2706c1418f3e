use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use edge_common::{Message, Priority};
use edge_queue::{MemoryQueue, Queue};
use edge_worker::{CommandHandler, QueueHandler, Result};

struct AlwaysSucceeds;

#[async_trait]
impl CommandHandler for AlwaysSucceeds {
    async fn handle(&self, _message: &Message) -> Result<bool> {
        Ok(true)
    }
}

#[tokio::test]
async fn drains_a_burst_of_messages_across_workers() {
    let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::default());
    for priority in [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ] {
        queue
            .enqueue(Message::new(HashMap::new(), priority))
            .await
            .unwrap();
    }

    let pool = Arc::new(QueueHandler::new(
        Arc::clone(&queue),
        Arc::new(AlwaysSucceeds),
        4,
        Duration::from_millis(20),
    ));
    pool.start().await;

    tokio::time::timeout(Duration::from_secs(2), async {
        while queue.size().await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pool should drain the burst");

    pool.stop(Duration::from_secs(1)).await;
}
