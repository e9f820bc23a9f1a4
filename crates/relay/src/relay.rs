use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use parcel_blob::BlobStore;
use parcel_core::{
    TransferRecord, TransferStatus, TtlPolicy, UploadLimits, new_transfer_id, validate_transfer_id,
};
use parcel_crypto::{
    CryptoError, MasterKey, ObjectKey, open_payload, seal_payload, unwrap_object_key,
    verify_password, wrap_object_key,
};
use parcel_registry::{DownloadGrant, TransferRegistry};
use parcel_scanner::{MalwareScanner, ScanVerdict};

use crate::error::TransferError;
use crate::metrics::RelayMetrics;

/// An upload handed to the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Display name for the eventual download, stored verbatim.
    pub filename: String,
    /// Plaintext payload.
    pub data: Bytes,
    /// Requested lifetime; must be a member of the allowed set.
    pub ttl_seconds: Option<u64>,
    /// Optional access password.
    pub password: Option<String>,
    /// Optional sender identity string.
    pub sender: Option<String>,
    /// Requested download budget; defaults per configuration.
    pub max_downloads: Option<u32>,
}

/// Handle returned for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: String,
    pub filename: String,
    pub expires_at: DateTime<Utc>,
}

/// Check-phase answer: existence is implied, protection is the only
/// detail disclosed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckStatus {
    pub protected: bool,
}

/// A successfully retrieved object.
#[derive(Debug, Clone)]
pub struct DownloadPayload {
    pub filename: String,
    pub data: Bytes,
    /// Downloads left after this one, if the budget is bounded.
    pub remaining_downloads: Option<u32>,
}

/// Non-sensitive projection of a record for the admin surface.
///
/// Never carries the password hash or any key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSummary {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub sender: Option<String>,
    pub protected: bool,
    pub download_count: u32,
    pub max_downloads: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: TransferStatus,
}

impl TransferSummary {
    fn from_record(record: &TransferRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id.clone(),
            filename: record.filename.clone(),
            size_bytes: record.size_bytes,
            sender: record.sender.clone(),
            protected: record.is_protected(),
            download_count: record.download_count,
            max_downloads: record.max_downloads,
            created_at: record.created_at,
            expires_at: record.expires_at,
            status: record.status(now),
        }
    }
}

/// The relay core: scanner-gated ingestion, check-then-download
/// retrieval, and the shared purge path used by consumption, the reaper,
/// and the admin surface.
///
/// Construct with [`RelayBuilder`](crate::builder::RelayBuilder).
pub struct Relay {
    pub(crate) registry: Arc<dyn TransferRegistry>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) scanner: Arc<dyn MalwareScanner>,
    pub(crate) master_key: MasterKey,
    pub(crate) ttl_policy: TtlPolicy,
    pub(crate) limits: UploadLimits,
    pub(crate) metrics: Arc<RelayMetrics>,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("ttl_policy", &self.ttl_policy)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Counters handle for the health surface.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Shared counters handle.
    pub fn metrics_arc(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Ingest an upload: validate, scan, seal, persist.
    ///
    /// Nothing is reserved while the scan is in flight; a rejected or
    /// failed upload leaves no blob and no record behind.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, TransferError> {
        let password = self.validate_upload(&request)?;

        let size = request.data.len() as u64;
        if size > self.limits.max_upload_bytes {
            self.metrics.increment_rejected_oversize();
            return Err(TransferError::TooLarge {
                size,
                limit: self.limits.max_upload_bytes,
            });
        }

        let Some(ttl) = self.ttl_policy.resolve(request.ttl_seconds) else {
            return Err(TransferError::Validation(format!(
                "ttl must be one of {:?} seconds",
                self.ttl_policy.allowed_seconds
            )));
        };

        match self.scanner.scan(&request.data).await? {
            ScanVerdict::Clean => {}
            ScanVerdict::Infected { signature } => {
                self.metrics.increment_rejected_malware();
                // The one failure kind that gets its own audit line: it
                // marks hostile input, not an operational fault.
                warn!(
                    scanner = self.scanner.name(),
                    signature = %signature,
                    size,
                    "malware detected; upload rejected"
                );
                return Err(TransferError::MalwareDetected { signature });
            }
        }

        let password_hash = match password {
            Some(pw) => Some(parcel_crypto::hash_password(&pw)?),
            None => None,
        };

        let object_key = ObjectKey::generate();
        let wrapped_key = wrap_object_key(&self.master_key, &object_key)?;
        let sealed = Bytes::from(seal_payload(&object_key, &request.data)?);

        let now = Utc::now();
        let record = TransferRecord {
            id: new_transfer_id(),
            filename: request.filename,
            size_bytes: size,
            sender: request.sender,
            password_hash,
            wrapped_key,
            created_at: now,
            expires_at: now + ttl,
            max_downloads: request.max_downloads.or(self.limits.default_max_downloads),
            download_count: 0,
        };
        let receipt = UploadReceipt {
            id: record.id.clone(),
            filename: record.filename.clone(),
            expires_at: record.expires_at,
        };

        // Persist on a detached task: a client that drops the connection
        // mid-response must not be able to cancel between the blob write
        // and the registry write.
        let registry = Arc::clone(&self.registry);
        let blobs = Arc::clone(&self.blobs);
        let persist = tokio::spawn(async move {
            let id = record.id.clone();
            blobs.put(&id, sealed).await?;
            if let Err(e) = registry.put(record).await {
                // Roll the blob back so no ciphertext outlives the
                // failed registration.
                if let Err(rollback) = blobs.delete(&id).await {
                    warn!(id = %id, error = %rollback, "blob rollback failed; orphan sweep will reclaim");
                }
                return Err(TransferError::from(e));
            }
            Ok(())
        });
        persist
            .await
            .map_err(|e| TransferError::Internal(format!("persist task failed: {e}")))??;

        self.metrics.increment_uploads();
        info!(
            id = %receipt.id,
            size,
            expires_at = %receipt.expires_at,
            "transfer stored"
        );
        Ok(receipt)
    }

    /// Check phase: disclose only whether the object exists and whether
    /// it is password-protected.
    pub async fn check(&self, id: &str) -> Result<CheckStatus, TransferError> {
        if !validate_transfer_id(id) {
            return Err(TransferError::Validation("malformed transfer id".into()));
        }
        match self.registry.get(id).await? {
            Some(record) => Ok(CheckStatus {
                protected: record.is_protected(),
            }),
            None => {
                self.metrics.increment_not_found();
                Err(TransferError::NotFound)
            }
        }
    }

    /// Download phase: re-validate, verify the password, reserve a slot,
    /// fetch and open the payload, purge on consumption.
    ///
    /// Password verification happens strictly before any blob read or
    /// decryption work; a wrong password costs the caller nothing but
    /// the hash check.
    pub async fn download(
        &self,
        id: &str,
        password: Option<&str>,
    ) -> Result<DownloadPayload, TransferError> {
        if !validate_transfer_id(id) {
            return Err(TransferError::Validation("malformed transfer id".into()));
        }

        let Some(record) = self.registry.get(id).await? else {
            self.metrics.increment_not_found();
            return Err(TransferError::NotFound);
        };

        if let Some(hash) = &record.password_hash {
            let Some(candidate) = password.filter(|p| !p.is_empty()) else {
                self.metrics.increment_auth_failures();
                return Err(TransferError::PasswordRequired);
            };
            if !verify_password(hash, candidate) {
                self.metrics.increment_auth_failures();
                return Err(TransferError::WrongPassword);
            }
        }

        // Time may have passed since the check and the password gate;
        // the grant re-validates expiry and budget atomically.
        let (record, consumed_budget) = match self.registry.begin_download(id).await? {
            DownloadGrant::Granted {
                record,
                consumed_budget,
            } => (record, consumed_budget),
            DownloadGrant::Exhausted => {
                self.metrics.increment_exhausted();
                return Err(TransferError::Exhausted);
            }
            DownloadGrant::NotFound => {
                self.metrics.increment_not_found();
                return Err(TransferError::NotFound);
            }
        };

        let sealed = match self.blobs.get(id).await {
            Ok(Some(sealed)) => sealed,
            Ok(None) => {
                // Lost the race against a purge: the grant landed on a
                // record whose blob is already gone. Fail clean.
                self.release_grant(id).await;
                self.metrics.increment_not_found();
                return Err(TransferError::NotFound);
            }
            Err(e) => {
                self.release_grant(id).await;
                return Err(e.into());
            }
        };

        let object_key = match unwrap_object_key(&self.master_key, &record.wrapped_key) {
            Ok(key) => key,
            Err(e) => {
                self.release_grant(id).await;
                return Err(self.integrity_fault(id, "stored key envelope failed to unwrap", e));
            }
        };

        let plaintext = match open_payload(&object_key, &sealed) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                self.release_grant(id).await;
                return Err(self.integrity_fault(id, "stored payload failed authenticated decryption", e));
            }
        };

        if consumed_budget {
            // The grant that took the final slot also removes the object,
            // inside the same request. Failures here never un-serve the
            // payload; the registry already refuses further grants.
            match self.purge(id).await {
                Ok(_) => info!(id, "download budget consumed; transfer removed"),
                Err(e) => warn!(id, error = %e, "post-consumption purge failed"),
            }
        }

        self.metrics.increment_downloads();
        Ok(DownloadPayload {
            filename: record.filename.clone(),
            data: Bytes::from(plaintext),
            remaining_downloads: record.remaining_downloads(),
        })
    }

    /// Remove an object's blob and record. Shared by budget consumption,
    /// the reaper, and the admin surface; idempotent against blobs or
    /// records that are already gone.
    ///
    /// Blob first, then record: a crash in between leaves a record whose
    /// downloads fail clean as not-found, never orphaned ciphertext
    /// beyond the registry's knowledge.
    pub async fn purge(&self, id: &str) -> Result<bool, TransferError> {
        self.blobs.delete(id).await?;
        Ok(self.registry.delete(id).await?)
    }

    /// Active records projected for the admin surface.
    pub async fn list_transfers(&self) -> Result<Vec<TransferSummary>, TransferError> {
        let now = Utc::now();
        let records = self.registry.list_active().await?;
        Ok(records
            .iter()
            .map(|record| TransferSummary::from_record(record, now))
            .collect())
    }

    /// Field validation, returning the normalized password. Empty and
    /// whitespace-only passwords count as absent.
    fn validate_upload(&self, request: &UploadRequest) -> Result<Option<String>, TransferError> {
        if request.filename.is_empty() {
            return Err(TransferError::Validation("filename must not be empty".into()));
        }
        if request.filename.len() > self.limits.max_filename_length {
            return Err(TransferError::Validation(format!(
                "filename exceeds {} bytes",
                self.limits.max_filename_length
            )));
        }
        if let Some(sender) = &request.sender
            && sender.len() > self.limits.max_sender_length
        {
            return Err(TransferError::Validation(format!(
                "sender exceeds {} bytes",
                self.limits.max_sender_length
            )));
        }
        if request.max_downloads == Some(0) {
            return Err(TransferError::Validation(
                "max_downloads must be at least 1".into(),
            ));
        }

        let password = request
            .password
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(pw) = password
            && pw.len() > self.limits.max_password_length
        {
            return Err(TransferError::Validation(format!(
                "password exceeds {} bytes",
                self.limits.max_password_length
            )));
        }
        Ok(password.map(ToOwned::to_owned))
    }

    async fn release_grant(&self, id: &str) {
        if let Err(e) = self.registry.cancel_download(id).await {
            warn!(id, error = %e, "failed to release download slot");
        }
    }

    fn integrity_fault(&self, id: &str, what: &str, e: CryptoError) -> TransferError {
        if matches!(e, CryptoError::DecryptionFailed) {
            self.metrics.increment_integrity_failures();
            // Should not occur in correct operation; this is the
            // operational alert the admin dashboards key on.
            error!(id, "{what}");
            TransferError::Integrity
        } else {
            e.into()
        }
    }
}
