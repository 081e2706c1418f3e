//! Cloud queue backend (AWS SQS): standard or FIFO queue with
//! visibility-timeout semantics; priority carried as a message attribute
//! since SQS has no native priority.
//!
//! Grounded on the reference `sqs_queue.py` (queue/DLQ naming, the
//! `Priority`/`TraceId` message attributes, FIFO `MessageGroupId` +
//! `MessageDeduplicationId = message.id`, and long-poll capped at 20s).

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use aws_sdk_sqs::{
    types::{MessageAttributeValue, MessageSystemAttributeName, QueueAttributeName},
    Client,
};
use dashmap::DashMap;
use edge_common::Message;

use crate::{
    config::CloudConfig,
    error::{QueueError, Result},
    queue::{HealthReport, Queue},
};

const MESSAGE_GROUP: &str = "robot-commands";

pub struct CloudQueue {
    client: Client,
    queue_url: String,
    dlq_url: String,
    use_fifo: bool,
    visibility_timeout: u32,
    wait_time_seconds: u32,
    in_flight: DashMap<String, (Message, String)>, // message id -> (message, receipt handle)
}

impl CloudQueue {
    pub async fn connect(config: &CloudConfig) -> Result<Self> {
        let shared = aws_config::from_env()
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;
        let client = Client::new(&shared);

        let queue_url = if let Some(url) = &config.queue_url {
            url.clone()
        } else {
            Self::resolve_or_create_queue(&client, config).await?
        };
        let dlq_url = Self::resolve_or_create_dlq(&client, config).await?;
        Self::attach_redrive_policy(&client, &queue_url, &dlq_url, config.max_receive_count)
            .await?;

        Ok(Self {
            client,
            queue_url,
            dlq_url,
            use_fifo: config.use_fifo,
            visibility_timeout: config.visibility_timeout,
            wait_time_seconds: config.wait_time_seconds,
            in_flight: DashMap::new(),
        })
    }

    async fn resolve_or_create_queue(client: &Client, config: &CloudConfig) -> Result<String> {
        let mut name = config.queue_name.clone();
        if config.use_fifo && !name.ends_with(".fifo") {
            name.push_str(".fifo");
        }

        if let Ok(existing) = client.get_queue_url().queue_name(&name).send().await {
            if let Some(url) = existing.queue_url {
                return Ok(url);
            }
        }

        let mut builder = client
            .create_queue()
            .queue_name(&name)
            .attributes(
                QueueAttributeName::VisibilityTimeout,
                config.visibility_timeout.to_string(),
            )
            .attributes(
                QueueAttributeName::ReceiveMessageWaitTimeSeconds,
                config.wait_time_seconds.to_string(),
            );
        if config.use_fifo {
            builder = builder
                .attributes(QueueAttributeName::FifoQueue, "true")
                .attributes(QueueAttributeName::ContentBasedDeduplication, "true");
        }

        let created = builder
            .send()
            .await
            .map_err(|e| QueueError::Cloud(e.to_string()))?;
        created
            .queue_url
            .ok_or_else(|| QueueError::Cloud("create_queue returned no queue_url".to_string()))
    }

    /// Resolves or creates the dead-letter queue named by `config.dlq_name`.
    /// A FIFO main queue requires a FIFO dead-letter queue too.
    async fn resolve_or_create_dlq(client: &Client, config: &CloudConfig) -> Result<String> {
        let mut name = config.dlq_name.clone();
        if config.use_fifo && !name.ends_with(".fifo") {
            name.push_str(".fifo");
        }

        if let Ok(existing) = client.get_queue_url().queue_name(&name).send().await {
            if let Some(url) = existing.queue_url {
                return Ok(url);
            }
        }

        let mut builder = client.create_queue().queue_name(&name);
        if config.use_fifo {
            builder = builder
                .attributes(QueueAttributeName::FifoQueue, "true")
                .attributes(QueueAttributeName::ContentBasedDeduplication, "true");
        }

        let created = builder
            .send()
            .await
            .map_err(|e| QueueError::Cloud(e.to_string()))?;
        created.queue_url.ok_or_else(|| {
            QueueError::Cloud("create_queue returned no queue_url for the dead-letter queue".to_string())
        })
    }

    /// Points the main queue's redrive policy at the dead-letter queue, so
    /// messages SQS redelivers past `max_receive_count` without an explicit
    /// ack/nack land there automatically.
    async fn attach_redrive_policy(
        client: &Client,
        queue_url: &str,
        dlq_url: &str,
        max_receive_count: i32,
    ) -> Result<()> {
        let dlq_arn = Self::queue_arn(client, dlq_url).await?;
        let policy = serde_json::json!({
            "deadLetterTargetArn": dlq_arn,
            "maxReceiveCount": max_receive_count,
        })
        .to_string();

        client
            .set_queue_attributes()
            .queue_url(queue_url)
            .attributes(QueueAttributeName::RedrivePolicy, policy)
            .send()
            .await
            .map_err(|e| QueueError::Cloud(e.to_string()))?;
        Ok(())
    }

    async fn queue_arn(client: &Client, queue_url: &str) -> Result<String> {
        let attrs = client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|e| QueueError::Cloud(e.to_string()))?;
        attrs
            .attributes
            .and_then(|m| m.get(&QueueAttributeName::QueueArn).cloned())
            .ok_or_else(|| QueueError::Cloud("queue attributes response missing QueueArn".to_string()))
    }
}

#[async_trait]
impl Queue for CloudQueue {
    async fn enqueue(&self, message: Message) -> Result<bool> {
        let body = serde_json::to_string(&message)?;

        let mut request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_attributes(
                "Priority",
                MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(message.priority.amqp_priority().to_string())
                    .build()
                    .expect("string attribute always builds"),
            )
            .message_attributes(
                "TraceId",
                MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(message.trace_id.clone().unwrap_or_default())
                    .build()
                    .expect("string attribute always builds"),
            );

        if self.use_fifo {
            request = request
                .message_group_id(MESSAGE_GROUP)
                .message_deduplication_id(&message.id);
        }

        Ok(request.send().await.is_ok())
    }

    async fn dequeue(&self, timeout: Option<Duration>) -> Result<Option<Message>> {
        let wait_time = match timeout {
            Some(Duration::ZERO) => 0,
            Some(d) => d.as_secs().min(20) as i32,
            None => i32::from(self.wait_time_seconds).min(20),
        };

        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_time)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::Cloud(e.to_string()))?;

        let Some(sqs_message) = response.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let body = sqs_message.body.unwrap_or_default();
        let message: Message = serde_json::from_str(&body)?;

        if let Some(handle) = sqs_message.receipt_handle {
            self.in_flight
                .insert(message.id.clone(), (message.clone(), handle));
        }

        Ok(Some(message))
    }

    async fn peek(&self) -> Result<Option<Message>> {
        // SQS has no native peek; approximate it by receiving with a short
        // visibility window and immediately resetting visibility to 0.
        let Some(message) = self.dequeue(Some(Duration::ZERO)).await? else {
            return Ok(None);
        };

        if let Some((_, (_, handle))) = self.in_flight.remove(&message.id) {
            let _ = self
                .client
                .change_message_visibility()
                .queue_url(&self.queue_url)
                .receipt_handle(handle)
                .visibility_timeout(0)
                .send()
                .await;
        }

        Ok(Some(message))
    }

    async fn ack(&self, id: &str) -> Result<bool> {
        let Some((_, (_, handle))) = self.in_flight.remove(id) else {
            return Ok(false);
        };
        Ok(self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(handle)
            .send()
            .await
            .is_ok())
    }

    async fn nack(&self, id: &str, requeue: bool) -> Result<bool> {
        let Some((_, (mut message, handle))) = self.in_flight.remove(id) else {
            return Ok(false);
        };

        if requeue && message.can_retry() {
            // SQS can't mutate an in-flight message's retry_count in
            // place: delete the original delivery, bump retry_count, and
            // republish as a fresh message, the same ack-then-requeue
            // pattern the AMQP backend uses.
            let _ = self
                .client
                .delete_message()
                .queue_url(&self.queue_url)
                .receipt_handle(&handle)
                .send()
                .await;
            message.retry_count += 1;
            return self.enqueue(message).await;
        }

        // Exhausted or not requeueable: route to the dead-letter queue
        // directly rather than rely on the redrive policy's receive-count
        // threshold, which only trips on implicit (visibility-timeout)
        // redelivery, not an explicit nack.
        let body = serde_json::to_string(&message)?;
        let _ = self
            .client
            .send_message()
            .queue_url(&self.dlq_url)
            .message_body(body)
            .send()
            .await;

        Ok(self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(handle)
            .send()
            .await
            .is_ok())
    }

    async fn size(&self) -> Result<usize> {
        let attrs = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Cloud(e.to_string()))?;

        Ok(attrs
            .attributes
            .and_then(|a| a.get(&QueueAttributeName::ApproximateNumberOfMessages).cloned())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    async fn clear(&self) -> Result<()> {
        self.client
            .purge_queue()
            .queue_url(&self.queue_url)
            .send()
            .await
            .map_err(|e| QueueError::Cloud(e.to_string()))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthReport> {
        match self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .send()
            .await
        {
            Ok(attrs) => {
                let mut report = HealthReport::healthy("sqs");
                let mut detail: HashMap<&str, serde_json::Value> = HashMap::new();
                if let Some(map) = attrs.attributes {
                    if let Some(v) = map.get(&QueueAttributeName::ApproximateNumberOfMessages) {
                        detail.insert("queue_size", v.clone().into());
                    }
                    if let Some(v) =
                        map.get(&QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
                    {
                        detail.insert("in_flight", v.clone().into());
                    }
                }
                for (k, v) in detail {
                    report.detail.insert(k.to_string(), v);
                }
                Ok(report)
            }
            Err(err) => Ok(HealthReport::unhealthy("sqs", err.to_string())),
        }
    }
}
