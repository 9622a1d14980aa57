//! Notification queue
//!
//! At-least-once delivery: a received message stays invisible for the
//! visibility timeout and comes back unless it is acknowledged. Ordering is
//! not guaranteed across publishes.

use async_trait::async_trait;

use crate::error::SyncResult;

pub mod postgres;

pub use postgres::PgNotificationQueue;

/// One received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Backend handle used to acknowledge the message
    pub handle: i64,
    pub body: String,
    /// How many times this message has been received, this delivery included
    pub receive_count: u32,
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn publish(&self, body: &str) -> SyncResult<()>;

    /// Receive up to `max` currently visible messages.
    async fn receive(&self, max: u32) -> SyncResult<Vec<Delivery>>;

    /// Delete a received message so it is never redelivered.
    async fn ack(&self, delivery: &Delivery) -> SyncResult<()>;
}
