use async_trait::async_trait;

use crate::error::ScanError;

/// Outcome of scanning a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    /// No signature matched; the payload may be stored.
    Clean,
    /// A signature matched; the payload must never reach storage.
    Infected {
        /// Engine-reported signature name (e.g. `Win.Test.EICAR_HDB-1`).
        signature: String,
    },
}

/// Adapter over an external scanning engine.
///
/// The engine is a black box: implementations stream bytes to it and
/// report its allow/deny verdict. Callers hold no storage resources
/// while a scan is in flight — nothing is reserved until the verdict
/// comes back clean.
#[async_trait]
pub trait MalwareScanner: Send + Sync {
    /// Returns the unique name of this scanner backend.
    fn name(&self) -> &str;

    /// Scan a payload and return the engine's verdict.
    async fn scan(&self, data: &[u8]) -> Result<ScanVerdict, ScanError>;

    /// Verify the engine is reachable and responding.
    async fn health_check(&self) -> Result<(), ScanError>;
}
