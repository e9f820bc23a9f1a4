use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for one uploaded object, keyed by its opaque id.
///
/// The record never holds plaintext key material: `wrapped_key` is the
/// per-object encryption key sealed under the server master key, and
/// `password_hash` is an argon2 PHC string. The encrypted payload itself
/// lives in the blob store under the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Opaque identifier (UUID v4), assigned at ingestion. Doubles as the
    /// blob storage key.
    pub id: String,
    /// Original filename, stored verbatim for the download response.
    /// Never interpreted as a filesystem path.
    pub filename: String,
    /// Plaintext size in bytes (informational; the stored blob is larger).
    pub size_bytes: u64,
    /// Optional free-text contact string supplied by the sender.
    #[serde(default)]
    pub sender: Option<String>,
    /// Argon2 hash of the access password; `None` means unprotected.
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Per-object AES-256 key wrapped by the master key
    /// (`ENC[AES256-GCM,...]` envelope).
    pub wrapped_key: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the object becomes unretrievable. Immutable after creation;
    /// deletion is the only permitted post-creation transition.
    pub expires_at: DateTime<Utc>,
    /// Download budget. `None` means unbounded.
    #[serde(default)]
    pub max_downloads: Option<u32>,
    /// Downloads granted so far.
    #[serde(default)]
    pub download_count: u32,
}

impl TransferRecord {
    /// Whether the record's lifetime has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether a password is required to download this object.
    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Whether the download budget is fully consumed.
    pub fn is_exhausted(&self) -> bool {
        self.max_downloads
            .is_some_and(|max| self.download_count >= max)
    }

    /// Downloads left before the budget is consumed, if bounded.
    pub fn remaining_downloads(&self) -> Option<u32> {
        self.max_downloads
            .map(|max| max.saturating_sub(self.download_count))
    }

    /// Derive the lifecycle status at `now`.
    ///
    /// Consumed and deleted records are physically removed from the
    /// registry, so a record still present is either active or (lazily)
    /// expired; [`TransferStatus::Consumed`] covers the window between
    /// the final grant and the purge completing.
    pub fn status(&self, now: DateTime<Utc>) -> TransferStatus {
        if self.is_expired(now) {
            TransferStatus::Expired
        } else if self.is_exhausted() {
            TransferStatus::Consumed
        } else {
            TransferStatus::Active
        }
    }
}

/// Lifecycle status of a transfer, derived rather than persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Retrievable: within its lifetime and under budget.
    Active,
    /// Download budget consumed; blob removal is imminent or done.
    Consumed,
    /// Lifetime elapsed; awaiting the reaper.
    Expired,
    /// Removed by an operator.
    Deleted,
}

/// Generate a fresh transfer id (UUID v4, 122 bits of randomness).
pub fn new_transfer_id() -> String {
    Uuid::new_v4().to_string()
}

/// Check that a caller-supplied id is a well-formed UUID.
///
/// Ids come in over the wire and are later used as storage keys, so
/// anything that does not parse is rejected before any lookup.
pub fn validate_transfer_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}
