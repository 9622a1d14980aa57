//! Exporter: full member snapshot → timestamped CSV object

use chrono::{DateTime, Utc};
use roster_common::tabular;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::db::MemberStore;
use crate::error::{SyncError, SyncResult};
use crate::storage::ObjectStore;

pub const EXPORT_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub bucket: String,
    /// Prepended verbatim to every object key
    pub prefix: String,
}

impl ExportSettings {
    pub fn from_config(pipeline: &PipelineConfig) -> Self {
        Self {
            bucket: pipeline.export_bucket.clone(),
            prefix: pipeline.export_prefix.clone(),
        }
    }
}

/// Result of one uploaded snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub key: String,
    pub rows: usize,
    pub size: usize,
    /// Hex-encoded SHA-256 of the uploaded bytes
    pub checksum: String,
}

pub struct Exporter {
    members: Arc<dyn MemberStore>,
    objects: Arc<dyn ObjectStore>,
    settings: ExportSettings,
}

impl Exporter {
    pub fn new(
        members: Arc<dyn MemberStore>,
        objects: Arc<dyn ObjectStore>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            members,
            objects,
            settings,
        }
    }

    pub fn object_key(&self, at: DateTime<Utc>) -> String {
        format!("{}{}.csv", self.settings.prefix, at.format("%Y%m%d%H%M%S"))
    }

    pub async fn export_now(&self) -> SyncResult<ExportReport> {
        self.export_at(Utc::now()).await
    }

    /// Scan, serialize and upload. Nothing is written unless every step
    /// before the upload succeeds.
    #[instrument(skip(self), fields(bucket = %self.settings.bucket))]
    pub async fn export_at(&self, at: DateTime<Utc>) -> SyncResult<ExportReport> {
        info!("Export started");

        let members = self.members.scan().await?;
        let data = tabular::write_members(&members)
            .map_err(|e| SyncError::Backend(anyhow::Error::new(e).context("Failed to serialize members")))?;

        let report = ExportReport {
            key: self.object_key(at),
            rows: members.len(),
            size: data.len(),
            checksum: format!("{:x}", Sha256::digest(&data)),
        };

        self.objects
            .write(&self.settings.bucket, &report.key, data, Some(EXPORT_CONTENT_TYPE))
            .await?;

        info!(
            key = %report.key,
            rows = report.rows,
            size = report.size,
            checksum = %report.checksum,
            "Export finished"
        );
        Ok(report)
    }
}
