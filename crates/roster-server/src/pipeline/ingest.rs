//! Ingest: uploaded roster → member store → notification queue
//!
//! Parsing is fail-fast: a bad upload writes nothing. After a successful
//! parse, every member is handled on its own. A store failure skips that
//! member's notification, and a publish failure leaves the member stored but
//! unqueued. A member is only ever queued after its upsert has succeeded.

use roster_common::{tabular, Member, NotificationTask};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::db::MemberStore;
use crate::error::{SyncError, SyncResult};
use crate::queue::NotificationQueue;
use crate::storage::ObjectStore;

/// Location of an uploaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Object-created notification in the S3 event format.
///
/// Only the fields the pipeline needs are modelled; anything else in the
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
}

impl ObjectCreatedEvent {
    /// Objects named by the event, with keys URL-decoded.
    ///
    /// S3 form-encodes keys in notifications, so `+` stands for a space.
    pub fn objects(&self) -> Vec<ObjectRef> {
        self.records
            .iter()
            .map(|record| {
                let raw = record.s3.object.key.replace('+', " ");
                let key = urlencoding::decode(&raw)
                    .map(|k| k.into_owned())
                    .unwrap_or_else(|_| raw.clone());
                ObjectRef::new(record.s3.bucket.name.clone(), key)
            })
            .collect()
    }
}

/// What happened to one parsed member
#[derive(Debug)]
pub enum IngestOutcome {
    /// Stored and one notification task published
    Queued,
    /// Stored, but publishing the notification task failed
    StoredNotQueued(SyncError),
    /// The upsert failed; nothing was published
    StoreFailed(SyncError),
}

impl IngestOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, IngestOutcome::StoreFailed(_))
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, IngestOutcome::Queued)
    }
}

/// Per-member outcomes of one ingest run, in file order
#[derive(Debug, Default)]
pub struct IngestReport {
    pub outcomes: Vec<(String, IngestOutcome)>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn stored(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_stored()).count()
    }

    pub fn queued(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_queued()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.stored()
    }
}

pub struct Ingestor {
    objects: Arc<dyn ObjectStore>,
    members: Arc<dyn MemberStore>,
    queue: Arc<dyn NotificationQueue>,
}

impl Ingestor {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        members: Arc<dyn MemberStore>,
        queue: Arc<dyn NotificationQueue>,
    ) -> Self {
        Self {
            objects,
            members,
            queue,
        }
    }

    /// Ingest every object named by an object-created notification.
    ///
    /// Objects are independent: one that cannot be read or parsed is logged
    /// and the rest are still ingested.
    pub async fn ingest_event(
        &self,
        event: &ObjectCreatedEvent,
    ) -> Vec<(ObjectRef, SyncResult<IngestReport>)> {
        let mut results = Vec::new();
        for object in event.objects() {
            let result = self.ingest_object(&object).await;
            if let Err(ref e) = result {
                error!(bucket = %object.bucket, key = %object.key, error = %e, "Ingest failed");
            }
            results.push((object, result));
        }
        results
    }

    /// Read, parse and sync one uploaded roster.
    #[instrument(skip(self), fields(bucket = %object.bucket, key = %object.key))]
    pub async fn ingest_object(&self, object: &ObjectRef) -> SyncResult<IngestReport> {
        info!("Ingest started");

        let payload = self.objects.read(&object.bucket, &object.key).await?;
        let members = tabular::parse_members(&payload)?;
        info!(rows = members.len(), "Roster parsed");

        let report = self.sync_members(members).await;

        info!(
            total = report.total(),
            stored = report.stored(),
            queued = report.queued(),
            failed = report.failed(),
            "Ingest finished"
        );
        Ok(report)
    }

    /// Upsert each member, then queue its notification.
    pub async fn sync_members(&self, members: Vec<Member>) -> IngestReport {
        let mut report = IngestReport::default();

        for member in members {
            let outcome = self.sync_member(&member).await;
            report.outcomes.push((member.email, outcome));
        }

        report
    }

    async fn sync_member(&self, member: &Member) -> IngestOutcome {
        if let Err(e) = self.members.upsert(member).await {
            error!(email = %member.email, error = %e, "Failed to store member");
            return IngestOutcome::StoreFailed(e);
        }

        let task = NotificationTask::new(member.email.as_str());
        match self.queue.publish(&task.to_body()).await {
            Ok(()) => IngestOutcome::Queued,
            Err(e) => {
                warn!(email = %member.email, error = %e, "Member stored but notification not queued");
                IngestOutcome::StoredNotQueued(e)
            }
        }
    }
}
