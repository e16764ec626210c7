//! Periodic capability sync.

use metrics::histogram;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::{CapabilitySyncJob, SyncFilter};

pub struct SyncScheduler {
    job: Arc<CapabilitySyncJob>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(job: Arc<CapabilitySyncJob>, interval: Duration) -> Self {
        Self { job, interval }
    }

    /// Runs a full sync every interval until `shutdown` fires. A sync in
    /// flight when shutdown is requested is abandoned and its pending
    /// provider tasks are aborted; providers already committed stay
    /// reconciled.
    #[instrument(skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "Starting capability sync scheduler"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Capability sync scheduler shutdown requested");
                    break;
                }
                _ = sleep(self.interval) => {
                    let tick_started = std::time::Instant::now();
                    let filter = SyncFilter::default();
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            warn!("Shutdown requested during capability sync; abandoning run");
                            break;
                        }
                        result = self.job.sync(&filter) => {
                            if let Err(err) = result {
                                error!(error = ?err, "Scheduled capability sync failed");
                            }
                        }
                    }
                    histogram!("capability_sync_tick_duration_ms")
                        .record(tick_started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Capability sync scheduler stopped");
    }
}
