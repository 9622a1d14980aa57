//! Periodic export trigger

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::Exporter;

pub struct ExportScheduler {
    exporter: Arc<Exporter>,
    period: Duration,
}

impl ExportScheduler {
    pub fn new(exporter: Arc<Exporter>, period: Duration) -> Self {
        Self { exporter, period }
    }

    /// Export once per period, first after one full period. Ticks missed
    /// while an export is still running are skipped.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(period_secs = self.period.as_secs(), "Export scheduler started");

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.exporter.export_now().await {
                        error!(error = %e, "Scheduled export failed");
                    }
                }
            }
        }

        info!("Export scheduler stopped");
    }
}
