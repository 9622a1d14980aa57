//! Notification queue consumer
//!
//! Pulls batches from the [`NotificationQueue`], hands them to the
//! [`Notifier`] and acknowledges the tasks that succeeded. Tasks that failed
//! on bad input or a missing member are acknowledged too, since a retry
//! cannot succeed. Only backend failures are left to reappear after the
//! visibility timeout.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::QueueConfig;
use crate::error::{ErrorKind, SyncResult};
use crate::pipeline::Notifier;
use crate::queue::NotificationQueue;

/// Counts from one receive/process/ack round
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub succeeded: usize,
    /// Failures left on the queue for redelivery
    pub failed: usize,
    /// Failures acknowledged because a retry cannot succeed
    pub rejected: usize,
    /// Over-limit deliveries dropped without processing
    pub discarded: usize,
}

pub struct NotificationWorker {
    queue: Arc<dyn NotificationQueue>,
    notifier: Arc<Notifier>,
    batch_size: u32,
    max_receives: u32,
    poll_interval: Duration,
}

impl NotificationWorker {
    pub fn new(queue: Arc<dyn NotificationQueue>, notifier: Arc<Notifier>, config: &QueueConfig) -> Self {
        Self {
            queue,
            notifier,
            batch_size: config.batch_size,
            max_receives: config.max_receives,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// Receive one batch, process it and ack everything except backend
    /// failures.
    pub async fn run_once(&self) -> SyncResult<BatchSummary> {
        let deliveries = self.queue.receive(self.batch_size).await?;
        let mut summary = BatchSummary {
            received: deliveries.len(),
            ..Default::default()
        };
        if deliveries.is_empty() {
            return Ok(summary);
        }

        let (expired, live): (Vec<_>, Vec<_>) = deliveries
            .into_iter()
            .partition(|d| d.receive_count > self.max_receives);

        for delivery in &expired {
            error!(
                handle = delivery.handle,
                body = %delivery.body,
                receive_count = delivery.receive_count,
                "Notification task exceeded max receives, discarding"
            );
            if let Err(e) = self.queue.ack(delivery).await {
                warn!(handle = delivery.handle, error = %e, "Failed to discard notification task");
            }
            summary.discarded += 1;
        }

        for (delivery, result) in self.notifier.process_batch(&live).await {
            match result {
                Ok(()) => {
                    if let Err(e) = self.queue.ack(&delivery).await {
                        // Redelivery will send the email again
                        warn!(handle = delivery.handle, error = %e, "Failed to ack notification task");
                    }
                    summary.succeeded += 1;
                }
                Err(e) => match e.kind() {
                    ErrorKind::Input | ErrorKind::NotFound => {
                        error!(
                            handle = delivery.handle,
                            body = %delivery.body,
                            error = %e,
                            "Notification task rejected, dropping"
                        );
                        if let Err(e) = self.queue.ack(&delivery).await {
                            warn!(handle = delivery.handle, error = %e, "Failed to drop notification task");
                        }
                        summary.rejected += 1;
                    }
                    ErrorKind::Backend => summary.failed += 1,
                },
            }
        }

        Ok(summary)
    }

    /// Poll until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(batch_size = self.batch_size, "Notification worker started");

        loop {
            let idle = match self.run_once().await {
                Ok(summary) => summary.received == 0,
                Err(e) => {
                    error!(error = %e, "Failed to poll notification queue");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            } else if shutdown.is_cancelled() {
                break;
            }
        }

        info!("Notification worker stopped");
    }
}
