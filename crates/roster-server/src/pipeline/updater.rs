//! Updater: externally pushed weight/height for an existing member

use roster_common::{Member, MetricUpdate};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::db::{ConditionalUpdate, FieldAssignment, MemberStore};
use crate::error::{SyncError, SyncResult};

pub struct Updater {
    members: Arc<dyn MemberStore>,
}

impl Updater {
    pub fn new(members: Arc<dyn MemberStore>) -> Self {
        Self { members }
    }

    /// Decode and validate a request body without touching the store.
    pub fn parse_request(body: &[u8]) -> SyncResult<MetricUpdate> {
        let update: MetricUpdate = serde_json::from_slice(body)
            .map_err(|e| SyncError::Input(format!("Malformed update body: {}", e)))?;
        update.validate()?;
        Ok(update)
    }

    /// Write only the provided metrics, and only if the member already exists.
    #[instrument(skip(self), fields(email = %update.email))]
    pub async fn apply(&self, update: MetricUpdate) -> SyncResult<Member> {
        let mut request = ConditionalUpdate::for_key(update.email.as_str());
        if let Some(weight) = update.weight {
            request = request.set(FieldAssignment::Weight(weight));
        }
        if let Some(height) = update.height {
            request = request.set(FieldAssignment::Height(height));
        }

        let member = self
            .members
            .conditional_update(request)
            .await
            .inspect_err(|e| error!(error = %e, "Metric update failed"))?;

        info!("Member metrics updated");
        Ok(member)
    }
}
