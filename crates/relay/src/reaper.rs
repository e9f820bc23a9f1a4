use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::relay::Relay;

/// Reaper scheduling and retry settings.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between sweeps. Short enough that expired objects do not
    /// outlive their TTL for long, long enough not to hammer the stores.
    pub interval: Duration,
    /// Purge failures per id tolerated before escalating to an
    /// error-level alert. The id stays scheduled either way.
    pub max_purge_attempts: u32,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_purge_attempts: 5,
        }
    }
}

/// Background sweep reconciling registry TTLs with blob store contents.
///
/// Two jobs per cycle:
///
/// 1. **Expiry**: every id past its `expires_at` is purged through the
///    same [`Relay::purge`] path that budget consumption and the admin
///    surface use. A purge that fails stays scheduled for the next
///    sweep; after [`ReaperConfig::max_purge_attempts`] failures the log
///    level escalates so operators notice, rather than the id being
///    dropped and its blob leaking.
/// 2. **Orphans**: blobs with no registry record (a crash between the
///    blob write and the registry write, or a failed rollback). A blob
///    must be seen orphaned on two consecutive sweeps before it is
///    deleted, so an upload that is mid-flight between its two writes is
///    never swept out from under it.
pub struct Reaper {
    relay: Arc<Relay>,
    config: ReaperConfig,
    purge_attempts: HashMap<String, u32>,
    orphan_candidates: HashSet<String>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Reaper {
    /// Create a reaper and the sender used to stop it.
    pub fn new(relay: Arc<Relay>, config: ReaperConfig) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                relay,
                config,
                purge_attempts: HashMap::new(),
                orphan_candidates: HashSet::new(),
                shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Run sweeps on the configured interval until shutdown is signaled.
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.config.interval);
        // The first tick completes immediately; skip it so startup does
        // not race a sweep against initial uploads.
        timer.tick().await;
        info!(interval_secs = self.config.interval.as_secs(), "reaper started");
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep().await;
                }
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("reaper stopped");
                        return;
                    }
                }
            }
        }
    }

    /// One reconciliation cycle. Public so callers can drive sweeps
    /// deterministically (tests, drain-on-shutdown).
    pub async fn sweep(&mut self) {
        self.sweep_expired().await;
        self.sweep_orphans().await;
    }

    async fn sweep_expired(&mut self) {
        let now = Utc::now();
        let expired = match self.relay.registry.scan_expired(now).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "reaper failed to scan for expired transfers");
                self.relay.metrics.increment_reap_errors();
                return;
            }
        };

        let mut purged = 0usize;
        for id in expired {
            match self.relay.purge(&id).await {
                Ok(_) => {
                    self.purge_attempts.remove(&id);
                    self.relay.metrics.increment_reaped_expired();
                    purged += 1;
                }
                Err(e) => {
                    self.relay.metrics.increment_reap_errors();
                    let attempts = self.purge_attempts.entry(id.clone()).or_insert(0);
                    *attempts += 1;
                    if *attempts >= self.config.max_purge_attempts {
                        error!(
                            id = %id,
                            attempts = *attempts,
                            error = %e,
                            "expired transfer repeatedly failed to purge; operator attention required"
                        );
                    } else {
                        warn!(
                            id = %id,
                            attempts = *attempts,
                            error = %e,
                            "failed to purge expired transfer; will retry"
                        );
                    }
                }
            }
        }
        if purged > 0 {
            info!(purged, "reaper removed expired transfers");
        }
    }

    async fn sweep_orphans(&mut self) {
        let blob_ids = match self.relay.blobs.list_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "reaper failed to list blobs for orphan sweep");
                return;
            }
        };

        let now = Utc::now();
        let expired: HashSet<String> = match self.relay.registry.scan_expired(now).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "reaper failed to scan registry for orphan sweep");
                return;
            }
        };

        let mut still_orphaned = HashSet::new();
        for id in blob_ids {
            // A blob is orphaned only when the registry knows nothing
            // about it at all — neither a live record nor an expired one
            // awaiting purge.
            if expired.contains(&id) {
                continue;
            }
            match self.relay.registry.get(&id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if self.orphan_candidates.contains(&id) {
                        match self.relay.blobs.delete(&id).await {
                            Ok(_) => {
                                self.relay.metrics.increment_reaped_orphan_blobs();
                                debug!(id = %id, "removed orphaned blob");
                            }
                            Err(e) => {
                                warn!(id = %id, error = %e, "failed to delete orphaned blob");
                                still_orphaned.insert(id);
                            }
                        }
                    } else {
                        still_orphaned.insert(id);
                    }
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "registry lookup failed during orphan sweep");
                }
            }
        }
        self.orphan_candidates = still_orphaned;
    }
}
