//! Periodic cleanup of expired files.
//!
//! One sweep marks past-expiration Completed records as Expired, then
//! removes Expired and Failed remnants: best-effort remote delete followed
//! by the Deleted transition, and finally purges terminal rows past the
//! retention window. Failure of one item's remote cleanup never blocks the
//! remaining items.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::bridge::RemoteBridge;
use crate::config::TransferConfig;
use crate::error::MetadataError;
use crate::lifecycle::FileStatus;
use crate::metadata::{Clock, MetadataStore};
use crate::transport::RemoteRequest;

/// Outcome of one sweep cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Completed records marked Expired
    pub expired_marked: usize,
    /// Records whose remote content was removed and status set to Deleted
    pub deleted: usize,
    /// Remote deletes that failed; those records stay for the next sweep
    pub delete_failures: usize,
    /// Terminal rows purged from the store
    pub purged: u64,
    /// Bytes freed by successful deletions
    pub bytes_freed: u64,
}

/// Background cleanup task over the metadata store and the bridge
pub struct CleanupSweeper {
    store: Arc<dyn MetadataStore>,
    bridge: Arc<RemoteBridge>,
    clock: Arc<dyn Clock>,
    config: TransferConfig,
    interval: Duration,
}

impl CleanupSweeper {
    /// Create a sweeper that runs every 6 hours
    pub fn new(
        store: Arc<dyn MetadataStore>,
        bridge: Arc<RemoteBridge>,
        clock: Arc<dyn Clock>,
        config: TransferConfig,
    ) -> Self {
        Self {
            store,
            bridge,
            clock,
            config,
            interval: Duration::from_secs(6 * 60 * 60),
        }
    }

    /// Override the sweep cadence
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the task is dropped
    pub async fn start(self) {
        let mut ticker = interval(self.interval);
        info!(interval = ?self.interval, "starting cleanup sweeper");
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(report) => {
                    if report == SweepReport::default() {
                        debug!("sweep found nothing to clean");
                    } else {
                        info!(
                            expired = report.expired_marked,
                            deleted = report.deleted,
                            failures = report.delete_failures,
                            purged = report.purged,
                            freed_bytes = report.bytes_freed,
                            "sweep completed"
                        );
                    }
                }
                Err(e) => warn!("sweep failed: {e}"),
            }
        }
    }

    /// One full sweep cycle (also the test entry point)
    pub async fn run_once(&self) -> Result<SweepReport, MetadataError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let stale = self.store.expired_before(now).await?;
        debug!(count = stale.len(), "expired records found");

        for mut record in stale {
            match record.status {
                FileStatus::Completed => {
                    if record.expire().is_ok() {
                        self.store.save(record).await?;
                        report.expired_marked += 1;
                    }
                }
                FileStatus::Expired => {
                    // Remote delete first; the Deleted transition happens
                    // only once the backend content is actually gone, so a
                    // failed delete is retried by a later sweep.
                    match self.delete_remote(&record).await {
                        Ok(()) => {
                            let size = record.size_bytes;
                            if record.delete().is_ok() {
                                self.store.save(record).await?;
                                report.deleted += 1;
                                report.bytes_freed += size;
                            }
                        }
                        Err(()) => report.delete_failures += 1,
                    }
                }
                // Pending uploads may still be in flight; Failed rows have
                // no remote content and fall to the purge below.
                _ => {}
            }
        }

        let purge_cutoff = now - ChronoDuration::days(self.config.purge_after_days);
        report.purged = self.store.purge_terminal_before(purge_cutoff).await?;

        Ok(report)
    }

    async fn delete_remote(&self, record: &crate::lifecycle::FileRecord) -> Result<(), ()> {
        let Some(handle) = record.handle.clone() else {
            return Ok(());
        };
        match self
            .bridge
            .call(
                RemoteRequest::DeleteMessage { handle },
                self.config.timeouts.delete,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(
                    session_id = record.session_id,
                    filename = record.filename,
                    "failed to delete expired file remotely: {e}"
                );
                Err(())
            }
        }
    }
}
