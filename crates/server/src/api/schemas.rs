use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use parcel_core::TransferStatus;
use parcel_relay::{MetricsSnapshot, TransferSummary};

/// Response after a successful upload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Opaque transfer id.
    #[schema(example = "8f14e45f-ceea-4a7a-9c5d-1c62f0a9a7b1")]
    pub id: String,
    /// Filename as it will be served on download.
    #[schema(example = "report.pdf")]
    pub filename: String,
    /// Retrieval link embedding the id as a query parameter.
    #[schema(example = "https://parcel.example.com/download?id=8f14e45f-ceea-4a7a-9c5d-1c62f0a9a7b1")]
    pub url: String,
    /// When the object becomes unretrievable.
    pub expires_at: DateTime<Utc>,
}

/// Check-phase response. Existence is implied by the 200; protection is
/// the only detail disclosed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckResponse {
    /// Whether a password is required to download.
    #[schema(example = true)]
    pub protected: bool,
}

/// Request body for the download phase.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Access password, when the check phase reported `protected`.
    #[serde(default)]
    pub password: Option<String>,
}

/// Multipart form accepted by the upload endpoint (documentation only).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The file contents; the part's filename is stored verbatim.
    #[schema(value_type = String, format = Binary)]
    pub file: String,
    /// Requested lifetime in seconds; must be in the allowed set.
    pub ttl_seconds: Option<u64>,
    /// Optional access password.
    pub password: Option<String>,
    /// Optional sender identity string.
    pub sender: Option<String>,
    /// Optional download budget.
    pub max_downloads: Option<u32>,
}

/// One active transfer as shown to the operator. Never includes the
/// password hash or key material.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferSummaryBody {
    pub id: String,
    #[schema(example = "report.pdf")]
    pub filename: String,
    pub size_bytes: u64,
    pub sender: Option<String>,
    pub protected: bool,
    pub download_count: u32,
    pub max_downloads: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[schema(example = "active")]
    pub status: String,
}

impl TransferSummaryBody {
    pub fn from_summary(summary: &TransferSummary) -> Self {
        let status = match summary.status {
            TransferStatus::Active => "active",
            TransferStatus::Consumed => "consumed",
            TransferStatus::Expired => "expired",
            TransferStatus::Deleted => "deleted",
        };
        Self {
            id: summary.id.clone(),
            filename: summary.filename.clone(),
            size_bytes: summary.size_bytes,
            sender: summary.sender.clone(),
            protected: summary.protected,
            download_count: summary.download_count,
            max_downloads: summary.max_downloads,
            created_at: summary.created_at,
            expires_at: summary.expires_at,
            status: status.to_owned(),
        }
    }
}

/// Admin listing of active transfers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminListResponse {
    /// Number of active transfers.
    #[schema(example = 3)]
    pub total_active: usize,
    pub transfers: Vec<TransferSummaryBody>,
}

/// Response after a forced deletion.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminDeleteResponse {
    pub id: String,
    #[schema(example = "deleted")]
    pub status: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status indicator.
    #[schema(example = "ok")]
    pub status: String,
    /// Current relay metrics snapshot.
    pub metrics: MetricsResponse,
}

/// Relay outcome counters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
    /// Objects accepted and stored.
    #[schema(example = 42)]
    pub uploads: u64,
    /// Successful downloads served.
    #[schema(example = 40)]
    pub downloads: u64,
    /// Uploads rejected by the scanning engine.
    #[schema(example = 1)]
    pub rejected_malware: u64,
    /// Uploads rejected for exceeding the size limit.
    #[schema(example = 0)]
    pub rejected_oversize: u64,
    /// Downloads rejected for a missing or wrong password.
    #[schema(example = 2)]
    pub auth_failures: u64,
    /// Lookups of absent or expired ids.
    #[schema(example = 5)]
    pub not_found: u64,
    /// Downloads rejected because the budget was consumed.
    #[schema(example = 1)]
    pub exhausted: u64,
    /// Stored payloads that failed authenticated decryption.
    #[schema(example = 0)]
    pub integrity_failures: u64,
    /// Expired objects removed by the reaper.
    #[schema(example = 7)]
    pub reaped_expired: u64,
    /// Orphaned blobs removed by the reaper.
    #[schema(example = 0)]
    pub reaped_orphan_blobs: u64,
    /// Reaper purge attempts that failed.
    #[schema(example = 0)]
    pub reap_errors: u64,
}

impl MetricsResponse {
    pub fn from_snapshot(snap: &MetricsSnapshot) -> Self {
        Self {
            uploads: snap.uploads,
            downloads: snap.downloads,
            rejected_malware: snap.rejected_malware,
            rejected_oversize: snap.rejected_oversize,
            auth_failures: snap.auth_failures,
            not_found: snap.not_found,
            exhausted: snap.exhausted,
            integrity_failures: snap.integrity_failures,
            reaped_expired: snap.reaped_expired,
            reaped_orphan_blobs: snap.reaped_orphan_blobs,
            reap_errors: snap.reap_errors,
        }
    }
}

/// Generic error response returned on failures.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    #[schema(example = "transfer not found")]
    pub error: String,
    /// Stable machine-readable failure kind.
    #[schema(example = "not_found")]
    pub code: String,
}
