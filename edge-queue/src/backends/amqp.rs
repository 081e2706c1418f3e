//! AMQP broker backend: topic exchange, a durable priority queue, and a
//! dead-letter exchange/queue.
//!
//! Grounded on the reference `rabbitmq_queue.py` topology (exchange
//! `robot.commands`, `x-max-priority: 10`, DLX bound with `#`) and on the
//! `lapin`-based consumer shape seen elsewhere in the corpus
//! (`tdd75-my-axum`'s `RabbitMQConsumer`).

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use edge_common::Message;
use futures_util::StreamExt;
use lapin::{
    acker::Acker,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
        QueuePurgeOptions,
    },
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use tokio::sync::Mutex;

use crate::{
    config::AmqpConfig,
    error::{QueueError, Result},
    queue::{HealthReport, Queue},
};

pub struct AmqpQueue {
    _connection: Connection,
    channel: Channel,
    queue_name: String,
    exchange: String,
    consumer: Mutex<Consumer>,
    in_flight: DashMap<String, (Message, Acker)>,
}

impl AmqpQueue {
    pub async fn connect(config: &AmqpConfig) -> Result<Self> {
        let connection =
            Connection::connect(&config.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .exchange_declare(
                &config.dlx,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                &config.dlq,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &config.dlq,
                &config.dlx,
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut args = FieldTable::default();
        args.insert("x-max-priority".into(), AMQPValue::ShortShortInt(10));
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(config.dlx.clone().into()),
        );
        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args,
            )
            .await?;

        for suffix in ["low", "normal", "high", "urgent"] {
            channel
                .queue_bind(
                    &config.queue,
                    &config.exchange,
                    &format!("command.{suffix}"),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                &config.queue,
                "edge-queue",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(Self {
            _connection: connection,
            channel,
            queue_name: config.queue.clone(),
            exchange: config.exchange.clone(),
            consumer: Mutex::new(consumer),
            in_flight: DashMap::new(),
        })
    }

    fn routing_key(message: &Message) -> String {
        format!("command.{}", message.priority.routing_key_suffix())
    }
}

#[async_trait]
impl Queue for AmqpQueue {
    async fn enqueue(&self, message: Message) -> Result<bool> {
        let payload = serde_json::to_vec(&message)?;
        let properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_priority(message.priority.amqp_priority());

        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                &Self::routing_key(&message),
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await;

        match confirm {
            Ok(pending) => Ok(pending.await.is_ok()),
            Err(_) => Ok(false),
        }
    }

    async fn dequeue(&self, timeout: Option<Duration>) -> Result<Option<Message>> {
        let mut consumer = self.consumer.lock().await;

        let next = async {
            loop {
                match consumer.next().await {
                    Some(Ok(delivery)) => return Some(delivery),
                    Some(Err(_)) => continue,
                    None => return None,
                }
            }
        };

        let delivery = match timeout {
            Some(Duration::ZERO) => {
                match tokio::time::timeout(Duration::ZERO, next).await {
                    Ok(d) => d,
                    Err(_) => return Ok(None),
                }
            }
            Some(d) => match tokio::time::timeout(d, next).await {
                Ok(d) => d,
                Err(_) => return Ok(None),
            },
            None => next.await,
        };

        let Some(delivery) = delivery else {
            return Ok(None);
        };

        let message: Message = serde_json::from_slice(&delivery.data)?;
        self.in_flight
            .insert(message.id.clone(), (message.clone(), delivery.acker));
        Ok(Some(message))
    }

    async fn peek(&self) -> Result<Option<Message>> {
        Err(QueueError::Unsupported(
            "peek is best-effort only on broker-backed queues; not implemented for AMQP",
        ))
    }

    async fn ack(&self, id: &str) -> Result<bool> {
        let Some((_, (_, acker))) = self.in_flight.remove(id) else {
            return Ok(false);
        };
        Ok(acker.ack(BasicAckOptions::default()).await.is_ok())
    }

    async fn nack(&self, id: &str, requeue: bool) -> Result<bool> {
        let Some((_, (mut message, acker))) = self.in_flight.remove(id) else {
            return Ok(false);
        };

        if requeue && message.can_retry() {
            // Retry accounting is consolidated here rather than split
            // across publish call sites: ack the original delivery, bump
            // retry_count, and republish as a fresh message.
            let _ = acker.ack(BasicAckOptions::default()).await;
            message.retry_count += 1;
            return self.enqueue(message).await;
        }

        // Exhausted or not requeueable: nack without requeue, routing to
        // the dead-letter exchange via the queue's `x-dead-letter-exchange`.
        Ok(acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue: false,
            })
            .await
            .is_ok())
    }

    async fn size(&self) -> Result<usize> {
        let declared = self
            .channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(declared.message_count() as usize)
    }

    async fn clear(&self) -> Result<()> {
        self.channel
            .queue_purge(&self.queue_name, QueuePurgeOptions::default())
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthReport> {
        match self
            .channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
        {
            Ok(declared) => {
                let mut report = HealthReport::healthy("amqp");
                let mut detail: HashMap<&str, serde_json::Value> = HashMap::new();
                detail.insert("message_count".into(), declared.message_count().into());
                detail.insert("consumer_count".into(), declared.consumer_count().into());
                for (k, v) in detail {
                    report.detail.insert(k.to_string(), v);
                }
                Ok(report)
            }
            Err(err) => Ok(HealthReport::unhealthy("amqp", err.to_string())),
        }
    }
}
