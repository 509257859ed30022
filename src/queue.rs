use crate::config::QueueConfig;
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client as SqsClient;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, instrument};

/// A message read from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned message id
    pub message_id: Option<String>,
    /// Receipt handle used to acknowledge (delete) the message
    pub receipt_handle: Option<String>,
    /// Text payload
    pub body: String,
}

/// Errors that can occur against the queue
#[derive(Error, Debug)]
pub enum QueueError {
    /// The underlying queue call failed; carries the rendered SDK error
    #[error("queue request failed: {0}")]
    Upstream(String),

    /// The queue resolved without a url
    #[error("queue {0} resolved without a url")]
    MissingUrl(String),
}

/// Text message queue used for todo notifications and reset triggers.
///
/// `send` is fire-and-forget with an at-most-once contract: delivery
/// failures are logged and counted but never reported to the caller.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Send a text message; failures are swallowed (logged and counted)
    async fn send(&self, message: &str);

    /// Poll for currently visible messages
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge a processed message so it is not redelivered
    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError>;
}

/// SQS-backed event queue
///
/// The queue URL is resolved from the logical name once per process, on
/// first use. Concurrent first resolvers coalesce onto the in-flight
/// lookup; a failed lookup leaves the cell unset so the next call retries.
pub struct SqsQueue {
    client: SqsClient,
    name: String,
    max_messages: i32,
    wait_time_seconds: i32,
    url: OnceCell<String>,
}

impl SqsQueue {
    /// Create a queue adapter for the configured logical queue
    pub fn new(
        shared_config: &aws_config::SdkConfig,
        config: &QueueConfig,
        endpoint_url: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_sqs::config::Builder::from(shared_config);

        // Custom endpoint for LocalStack / ElasticMQ
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let client = SqsClient::from_conf(builder.build());

        info!(queue = %config.name, "Event queue initialized");

        Self {
            client,
            name: config.name.clone(),
            max_messages: config.max_messages,
            wait_time_seconds: config.wait_time_seconds,
            url: OnceCell::new(),
        }
    }

    /// Resolve and cache the queue URL
    async fn endpoint(&self) -> Result<&str, QueueError> {
        self.url
            .get_or_try_init(|| async {
                info!(queue = %self.name, "Resolving queue url");

                let output = self
                    .client
                    .get_queue_url()
                    .queue_name(&self.name)
                    .send()
                    .await
                    .map_err(|e| QueueError::Upstream(DisplayErrorContext(e).to_string()))?;

                let url = output
                    .queue_url()
                    .map(String::from)
                    .ok_or_else(|| QueueError::MissingUrl(self.name.clone()))?;

                info!(queue = %self.name, url = %url, "Resolved queue url");
                Ok(url)
            })
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl EventQueue for SqsQueue {
    #[instrument(skip(self, message))]
    async fn send(&self, message: &str) {
        let url = match self.endpoint().await {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Failed to resolve queue url; message dropped");
                metrics::counter!("todo.queue.send.failed").increment(1);
                return;
            }
        };

        match self
            .client
            .send_message()
            .queue_url(url)
            .message_body(message)
            .send()
            .await
        {
            Ok(output) => {
                info!(message_id = ?output.message_id(), "Queue message sent");
                metrics::counter!("todo.queue.send.ok").increment(1);
            }
            Err(e) => {
                error!(error = %DisplayErrorContext(e), "Failed to send queue message");
                metrics::counter!("todo.queue.send.failed").increment(1);
            }
        }
    }

    #[instrument(skip(self))]
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let url = self.endpoint().await?;

        let output = self
            .client
            .receive_message()
            .queue_url(url)
            .max_number_of_messages(self.max_messages)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Upstream(DisplayErrorContext(e).to_string()))?;

        let messages: Vec<QueueMessage> = output
            .messages()
            .iter()
            .map(|m| QueueMessage {
                message_id: m.message_id().map(String::from),
                receipt_handle: m.receipt_handle().map(String::from),
                body: m.body().unwrap_or_default().to_string(),
            })
            .collect();

        debug!(count = messages.len(), "Received queue messages");
        Ok(messages)
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let Some(receipt_handle) = &message.receipt_handle else {
            return Ok(());
        };

        let url = self.endpoint().await?;

        self.client
            .delete_message()
            .queue_url(url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Upstream(DisplayErrorContext(e).to_string()))?;

        debug!(message_id = ?message.message_id, "Queue message acknowledged");
        Ok(())
    }
}

/// In-memory event queue for tests and local development
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<MemoryQueueInner>,
}

#[derive(Debug, Default)]
struct MemoryQueueInner {
    pending: Mutex<VecDeque<QueueMessage>>,
    sent: Mutex<Vec<String>>,
}

impl MemoryQueue {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an inbound message, as if delivered by the queue
    pub async fn push(&self, body: impl Into<String>) {
        let mut pending = self.inner.pending.lock().await;
        pending.push_back(QueueMessage {
            message_id: None,
            receipt_handle: None,
            body: body.into(),
        });
    }

    /// Bodies sent through this queue, in order
    pub async fn sent(&self) -> Vec<String> {
        self.inner.sent.lock().await.clone()
    }
}

#[async_trait]
impl EventQueue for MemoryQueue {
    async fn send(&self, message: &str) {
        self.inner.sent.lock().await.push(message.to_string());
        self.push(message).await;
    }

    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let mut pending = self.inner.pending.lock().await;
        Ok(pending.drain(..).collect())
    }

    async fn acknowledge(&self, _message: &QueueMessage) -> Result<(), QueueError> {
        // receive() already removed the message
        Ok(())
    }
}
