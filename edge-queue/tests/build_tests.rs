use edge_common::{Message, Priority};
use edge_queue::{QueueConfig, QueueType};
use std::collections::HashMap;

#[tokio::test]
async fn build_produces_a_working_memory_queue() {
    let config = QueueConfig {
        queue_type: QueueType::Memory,
        max_size: Some(10),
        ..QueueConfig::default()
    };

    let queue = edge_queue::build(&config).await.expect("memory backend always builds");

    let message = Message::new(HashMap::new(), Priority::Urgent);
    assert!(queue.enqueue(message.clone()).await.unwrap());
    assert_eq!(queue.size().await.unwrap(), 1);

    let dequeued = queue
        .dequeue(Some(std::time::Duration::ZERO))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dequeued.id, message.id);
    assert!(queue.ack(&dequeued.id).await.unwrap());

    let health = queue.health_check().await.unwrap();
    assert!(health.is_healthy());
}

#[tokio::test]
async fn build_rejects_amqp_without_config_section() {
    let config = QueueConfig {
        queue_type: QueueType::Amqp,
        ..QueueConfig::default()
    };

    let err = edge_queue::build(&config).await.unwrap_err();
    assert!(matches!(err, edge_queue::QueueError::Unsupported(_)));
}
