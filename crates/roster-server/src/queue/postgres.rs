//! PostgreSQL-backed notification queue
//!
//! Messages live in `notification_queue`. Receiving bumps `receive_count` and
//! pushes `visible_at` forward by the visibility timeout in the same statement,
//! with `FOR UPDATE SKIP LOCKED` so concurrent consumers never claim the same
//! row.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{Delivery, NotificationQueue};
use crate::config::QueueConfig;
use crate::error::SyncResult;

#[derive(Clone)]
pub struct PgNotificationQueue {
    pool: PgPool,
    queue: String,
    visibility_timeout: Duration,
    publish_delay: Duration,
}

impl PgNotificationQueue {
    pub fn new(pool: PgPool, config: &QueueConfig) -> Self {
        Self {
            pool,
            queue: config.name.clone(),
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
            publish_delay: Duration::from_secs(config.publish_delay_secs),
        }
    }
}

#[async_trait]
impl NotificationQueue for PgNotificationQueue {
    #[instrument(skip(self), fields(queue = %self.queue))]
    async fn publish(&self, body: &str) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_queue (queue, body, visible_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            "#,
        )
        .bind(&self.queue)
        .bind(body)
        .bind(self.publish_delay.as_secs_f64())
        .execute(&self.pool)
        .await
        .context("Failed to publish notification task")?;

        debug!("Notification task published");
        Ok(())
    }

    #[instrument(skip(self), fields(queue = %self.queue))]
    async fn receive(&self, max: u32) -> SyncResult<Vec<Delivery>> {
        let rows: Vec<(i64, String, i32)> = sqlx::query_as(
            r#"
            UPDATE notification_queue
            SET receive_count = receive_count + 1,
                visible_at = NOW() + make_interval(secs => $3)
            WHERE id IN (
                SELECT id FROM notification_queue
                WHERE queue = $1 AND visible_at <= NOW()
                ORDER BY id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, body, receive_count
            "#,
        )
        .bind(&self.queue)
        .bind(i64::from(max))
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .context("Failed to receive notification tasks")?;

        let mut deliveries: Vec<Delivery> = rows
            .into_iter()
            .map(|(handle, body, receive_count)| Delivery {
                handle,
                body,
                receive_count: receive_count.max(0) as u32,
            })
            .collect();
        // RETURNING order is unspecified
        deliveries.sort_by_key(|d| d.handle);

        debug!(count = deliveries.len(), "Notification tasks received");
        Ok(deliveries)
    }

    #[instrument(skip(self, delivery), fields(queue = %self.queue, handle = delivery.handle))]
    async fn ack(&self, delivery: &Delivery) -> SyncResult<()> {
        sqlx::query("DELETE FROM notification_queue WHERE id = $1")
            .bind(delivery.handle)
            .execute(&self.pool)
            .await
            .context("Failed to acknowledge notification task")?;

        Ok(())
    }
}
