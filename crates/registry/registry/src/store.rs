use async_trait::async_trait;
use chrono::{DateTime, Utc};

use parcel_core::TransferRecord;

use crate::error::RegistryError;

/// Result of an atomic download-slot reservation.
#[derive(Debug, Clone)]
pub enum DownloadGrant {
    /// A slot was reserved; `record` reflects the post-increment state.
    /// `consumed_budget` is `true` when this grant took the final slot
    /// and the object must be purged once the payload has been served.
    Granted {
        record: TransferRecord,
        consumed_budget: bool,
    },
    /// The download budget was already fully consumed.
    Exhausted,
    /// No live record exists under this id (absent or expired).
    NotFound,
}

/// Trait for persisting transfer metadata with per-record lifetimes.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Mutating operations on the *same* id must be atomic with respect to
/// each other; operations on unrelated ids must not contend.
///
/// Expired records read as absent through [`get`](Self::get),
/// [`begin_download`](Self::begin_download), and
/// [`list_active`](Self::list_active), but implementations keep them
/// enumerable through [`scan_expired`](Self::scan_expired) until
/// [`delete`](Self::delete) is called, so the reaper can pair every
/// metadata removal with a blob removal.
#[async_trait]
pub trait TransferRegistry: Send + Sync {
    /// Store a new record under its id. The record's `expires_at` drives
    /// expiry; no separate TTL parameter exists.
    async fn put(&self, record: TransferRecord) -> Result<(), RegistryError>;

    /// Get a live record. Returns `None` if absent or expired.
    async fn get(&self, id: &str) -> Result<Option<TransferRecord>, RegistryError>;

    /// Atomically reserve one download slot: increment `download_count`
    /// iff the record is live and under budget.
    async fn begin_download(&self, id: &str) -> Result<DownloadGrant, RegistryError>;

    /// Release a previously granted slot after a failed delivery, so an
    /// I/O error does not burn the sender's budget.
    async fn cancel_download(&self, id: &str) -> Result<(), RegistryError>;

    /// Delete a record. Returns `true` if a record (live or expired)
    /// existed.
    async fn delete(&self, id: &str) -> Result<bool, RegistryError>;

    /// All live records, for the admin surface.
    async fn list_active(&self) -> Result<Vec<TransferRecord>, RegistryError>;

    /// Ids of records whose `expires_at` is at or before `now`, for the
    /// reaper.
    async fn scan_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, RegistryError>;
}
