//! Notifier: queued member key → signed link → email → `notified` flag
//!
//! Each task runs its three steps strictly in order and stops at the first
//! failure. Tasks in a batch are independent of each other.

use roster_common::NotificationTask;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::config::{MailConfig, PipelineConfig};
use crate::db::{ConditionalUpdate, FieldAssignment, MemberStore};
use crate::error::SyncResult;
use crate::mail::{Email, Mailer};
use crate::queue::Delivery;
use crate::storage::ObjectStore;

/// Link target and message envelope for notifications
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub link_bucket: String,
    pub link_key: String,
    pub link_ttl: Duration,
    pub sender: String,
    pub subject: String,
}

impl NotifierSettings {
    pub fn from_config(pipeline: &PipelineConfig, mail: &MailConfig) -> Self {
        Self {
            link_bucket: pipeline.link_bucket.clone(),
            link_key: pipeline.link_key.clone(),
            link_ttl: pipeline.link_ttl(),
            sender: mail.sender.clone(),
            subject: mail.subject.clone(),
        }
    }
}

pub struct Notifier {
    objects: Arc<dyn ObjectStore>,
    mailer: Arc<dyn Mailer>,
    members: Arc<dyn MemberStore>,
    settings: NotifierSettings,
}

impl Notifier {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        mailer: Arc<dyn Mailer>,
        members: Arc<dyn MemberStore>,
        settings: NotifierSettings,
    ) -> Self {
        Self {
            objects,
            mailer,
            members,
            settings,
        }
    }

    /// Email one member a fresh signed link, then mark them notified.
    #[instrument(skip(self))]
    pub async fn notify(&self, email: &str) -> SyncResult<()> {
        let link = self
            .objects
            .presign_get(
                &self.settings.link_bucket,
                &self.settings.link_key,
                self.settings.link_ttl,
            )
            .await
            .inspect_err(|e| error!(error = %e, "Failed to issue signed link"))?;

        let message = Email {
            from: self.settings.sender.clone(),
            to: email.to_string(),
            subject: self.settings.subject.clone(),
            body: link,
        };
        self.mailer
            .send(&message)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to send notification email"))?;

        let update = ConditionalUpdate::for_key(email).set(FieldAssignment::Notified(true));
        self.members
            .conditional_update(update)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to mark member notified"))?;

        info!("Member notified");
        Ok(())
    }

    /// Run every delivered task in order. Failures are returned alongside
    /// their delivery and never stop the batch.
    pub async fn process_batch(&self, deliveries: &[Delivery]) -> Vec<(Delivery, SyncResult<()>)> {
        let mut results = Vec::with_capacity(deliveries.len());

        for delivery in deliveries {
            let result = match NotificationTask::from_body(&delivery.body) {
                Ok(task) => self.notify(&task.email).await,
                Err(e) => {
                    error!(handle = delivery.handle, error = %e, "Malformed notification task");
                    Err(e.into())
                }
            };
            results.push((delivery.clone(), result));
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(
            total = results.len(),
            succeeded = results.len() - failed,
            failed,
            "Notification batch processed"
        );
        results
    }
}
