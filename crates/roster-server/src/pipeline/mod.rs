//! The four pipeline stages and their wiring
//!
//! ```text
//! upload ─► Ingestor ─► members ─► queue ─► Notifier ─► email + notified flag
//! POST /members ─► Updater ─► members
//! tick ─► Exporter ─► members (scan) ─► CSV object
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::db::MemberStore;
use crate::mail::Mailer;
use crate::queue::NotificationQueue;
use crate::storage::ObjectStore;

pub mod exporter;
pub mod ingest;
pub mod notifier;
pub mod updater;

pub use exporter::{ExportReport, ExportSettings, Exporter};
pub use ingest::{IngestOutcome, IngestReport, Ingestor, ObjectCreatedEvent, ObjectRef};
pub use notifier::{Notifier, NotifierSettings};
pub use updater::Updater;

/// Backends shared by every stage
#[derive(Clone)]
pub struct Backends {
    pub objects: Arc<dyn ObjectStore>,
    pub members: Arc<dyn MemberStore>,
    pub queue: Arc<dyn NotificationQueue>,
    pub mailer: Arc<dyn Mailer>,
}

/// Fully wired stages, built once at start-up
#[derive(Clone)]
pub struct Pipeline {
    pub ingestor: Arc<Ingestor>,
    pub notifier: Arc<Notifier>,
    pub updater: Arc<Updater>,
    pub exporter: Arc<Exporter>,
    pub backends: Backends,
}

impl Pipeline {
    pub fn new(backends: Backends, config: &Config) -> Self {
        let ingestor = Ingestor::new(
            backends.objects.clone(),
            backends.members.clone(),
            backends.queue.clone(),
        );
        let notifier = Notifier::new(
            backends.objects.clone(),
            backends.mailer.clone(),
            backends.members.clone(),
            NotifierSettings::from_config(&config.pipeline, &config.mail),
        );
        let updater = Updater::new(backends.members.clone());
        let exporter = Exporter::new(
            backends.members.clone(),
            backends.objects.clone(),
            ExportSettings::from_config(&config.pipeline),
        );

        Self {
            ingestor: Arc::new(ingestor),
            notifier: Arc::new(notifier),
            updater: Arc::new(updater),
            exporter: Arc::new(exporter),
            backends,
        }
    }
}
