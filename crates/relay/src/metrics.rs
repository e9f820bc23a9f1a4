use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters tracking relay outcomes.
///
/// All counters use relaxed ordering for maximum throughput. For a
/// consistent point-in-time view, call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Objects accepted and stored.
    pub uploads: AtomicU64,
    /// Successful downloads served.
    pub downloads: AtomicU64,
    /// Uploads rejected by the scanning engine.
    pub rejected_malware: AtomicU64,
    /// Uploads rejected for exceeding the size limit.
    pub rejected_oversize: AtomicU64,
    /// Downloads rejected for a missing or wrong password.
    pub auth_failures: AtomicU64,
    /// Lookups of absent or expired ids.
    pub not_found: AtomicU64,
    /// Downloads rejected because the budget was consumed.
    pub exhausted: AtomicU64,
    /// Stored payloads that failed authenticated decryption.
    pub integrity_failures: AtomicU64,
    /// Expired objects removed by the reaper.
    pub reaped_expired: AtomicU64,
    /// Orphaned blobs removed by the reaper.
    pub reaped_orphan_blobs: AtomicU64,
    /// Reaper purge attempts that failed.
    pub reap_errors: AtomicU64,
}

impl RelayMetrics {
    pub fn increment_uploads(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_downloads(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_malware(&self) {
        self.rejected_malware.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_oversize(&self) {
        self.rejected_oversize.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_integrity_failures(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reaped_expired(&self) {
        self.reaped_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reaped_orphan_blobs(&self) {
        self.reaped_orphan_blobs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reap_errors(&self) {
        self.reap_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads: self.uploads.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            rejected_malware: self.rejected_malware.load(Ordering::Relaxed),
            rejected_oversize: self.rejected_oversize.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            reaped_expired: self.reaped_expired.load(Ordering::Relaxed),
            reaped_orphan_blobs: self.reaped_orphan_blobs.load(Ordering::Relaxed),
            reap_errors: self.reap_errors.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of the relay counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uploads: u64,
    pub downloads: u64,
    pub rejected_malware: u64,
    pub rejected_oversize: u64,
    pub auth_failures: u64,
    pub not_found: u64,
    pub exhausted: u64,
    pub integrity_failures: u64,
    pub reaped_expired: u64,
    pub reaped_orphan_blobs: u64,
    pub reap_errors: u64,
}
