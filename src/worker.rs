use crate::queue::{EventQueue, QueueError, QueueMessage};
use crate::reset;
use crate::store::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Message body that triggers a bulk reset
pub const RESET_COMMAND: &str = "reset";

/// Pause after a failed receive before polling again
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Polls the event queue and dispatches known commands.
///
/// Message body `reset` runs the bulk reset; anything else is logged as
/// unknown and dropped. Every handled message is acknowledged so the
/// queue does not redeliver it, even when the command itself failed.
pub struct QueueWorker {
    queue: Arc<dyn EventQueue>,
    store: Arc<dyn RecordStore>,
}

impl QueueWorker {
    pub fn new(queue: Arc<dyn EventQueue>, store: Arc<dyn RecordStore>) -> Self {
        Self { queue, store }
    }

    /// Poll and dispatch until the task is aborted
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!("Starting queue worker");

        loop {
            match self.poll_once().await {
                Ok(0) => {}
                Ok(handled) => info!(count = handled, "Handled queue events"),
                Err(e) => {
                    error!(error = %e, "Queue receive failed");
                    metrics::counter!("todo.queue.receive.failed").increment(1);
                    sleep(RECEIVE_ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Receive one batch and handle every message in it
    pub async fn poll_once(&self) -> Result<usize, QueueError> {
        let messages = self.queue.receive().await?;

        for message in &messages {
            self.handle(message).await;
        }

        Ok(messages.len())
    }

    async fn handle(&self, message: &QueueMessage) {
        info!(
            message_id = ?message.message_id,
            body = %message.body,
            "Got queue event"
        );

        if message.body == RESET_COMMAND {
            match reset::run(self.store.as_ref()).await {
                Ok(report) => {
                    info!(
                        deleted = report.deleted,
                        inserted = report.inserted,
                        "Reset triggered by queue event"
                    );
                }
                Err(e) => error!(error = %e, "Queue-triggered reset failed"),
            }
            metrics::counter!("todo.queue.messages.processed").increment(1);
        } else {
            warn!(body = %message.body, "Unknown queue event");
            metrics::counter!("todo.queue.messages.unknown").increment(1);
        }

        if let Err(e) = self.queue.acknowledge(message).await {
            warn!(error = %e, "Failed to acknowledge queue message");
        }
    }
}
