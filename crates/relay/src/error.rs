use thiserror::Error;

use parcel_blob::BlobError;
use parcel_crypto::CryptoError;
use parcel_registry::RegistryError;
use parcel_scanner::ScanError;

/// Failure taxonomy for relay operations.
///
/// Every variant maps to a distinct outward signal; none of them are
/// collapsed onto a generic error at the HTTP boundary.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Malformed input (bad TTL, bad id, oversized fields). Rejected
    /// before any side effect.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Payload exceeds the configured size limit. Rejected before the
    /// scan begins.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// The scanning engine matched a signature. Terminal for this
    /// upload; nothing was stored.
    #[error("malware detected: {signature}")]
    MalwareDetected { signature: String },

    /// The object is password-protected and no password was supplied.
    #[error("password required")]
    PasswordRequired,

    /// The supplied password does not match.
    #[error("wrong password")]
    WrongPassword,

    /// No live object under this id (absent or expired — the two are
    /// indistinguishable by design).
    #[error("transfer not found")]
    NotFound,

    /// The download budget is consumed. The object existed but is gone.
    #[error("download limit reached")]
    Exhausted,

    /// Authenticated decryption of the stored payload failed. Signals
    /// corruption or tampering, not a caller mistake.
    #[error("stored payload failed integrity verification")]
    Integrity,

    /// The scanning engine could not produce a verdict. Never treated
    /// as a pass; safe to retry.
    #[error("scanner unavailable: {0}")]
    ScannerUnavailable(#[from] ScanError),

    /// A registry backend fault. Safe to retry; no partial artifacts
    /// remain.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A blob storage fault. Safe to retry; no partial artifacts remain.
    #[error("blob storage error: {0}")]
    Storage(#[from] BlobError),

    /// A cryptographic operation failed for a reason other than an
    /// integrity mismatch (bad key material, malformed envelope).
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The relay was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal task failed to complete.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Returns `true` if the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ScannerUnavailable(_) | Self::Registry(_) | Self::Storage(_) | Self::Internal(_)
        )
    }
}
