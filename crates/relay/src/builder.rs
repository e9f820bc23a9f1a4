use std::sync::Arc;

use parcel_blob::BlobStore;
use parcel_core::{TtlPolicy, UploadLimits};
use parcel_crypto::MasterKey;
use parcel_registry::TransferRegistry;
use parcel_scanner::MalwareScanner;

use crate::error::TransferError;
use crate::metrics::RelayMetrics;
use crate::relay::Relay;

/// Fluent builder for constructing a [`Relay`] instance.
///
/// A registry, a blob store, a scanner, and a master key must be
/// supplied; TTL policy and upload limits default to the standard
/// configuration.
pub struct RelayBuilder {
    registry: Option<Arc<dyn TransferRegistry>>,
    blobs: Option<Arc<dyn BlobStore>>,
    scanner: Option<Arc<dyn MalwareScanner>>,
    master_key: Option<MasterKey>,
    ttl_policy: TtlPolicy,
    limits: UploadLimits,
}

impl RelayBuilder {
    /// Create a new builder with all optional fields set to their defaults.
    pub fn new() -> Self {
        Self {
            registry: None,
            blobs: None,
            scanner: None,
            master_key: None,
            ttl_policy: TtlPolicy::default(),
            limits: UploadLimits::default(),
        }
    }

    /// Set the metadata registry implementation.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn TransferRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the blob store implementation.
    #[must_use]
    pub fn blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Set the malware scanner adapter.
    #[must_use]
    pub fn scanner(mut self, scanner: Arc<dyn MalwareScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Set the master key used to wrap per-object keys.
    #[must_use]
    pub fn master_key(mut self, key: MasterKey) -> Self {
        self.master_key = Some(key);
        self
    }

    /// Set the allowed TTL set and default lifetime.
    #[must_use]
    pub fn ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    /// Set upload size and field limits.
    #[must_use]
    pub fn limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the relay, verifying that required components are present
    /// and the TTL policy is internally consistent.
    pub fn build(self) -> Result<Relay, TransferError> {
        let registry = self
            .registry
            .ok_or_else(|| TransferError::Configuration("a registry is required".into()))?;
        let blobs = self
            .blobs
            .ok_or_else(|| TransferError::Configuration("a blob store is required".into()))?;
        let scanner = self
            .scanner
            .ok_or_else(|| TransferError::Configuration("a scanner is required".into()))?;
        let master_key = self
            .master_key
            .ok_or_else(|| TransferError::Configuration("a master key is required".into()))?;

        if self.ttl_policy.allowed_seconds.is_empty() {
            return Err(TransferError::Configuration(
                "the allowed TTL set must not be empty".into(),
            ));
        }
        if !self
            .ttl_policy
            .allowed_seconds
            .contains(&self.ttl_policy.default_seconds)
        {
            return Err(TransferError::Configuration(
                "the default TTL must be a member of the allowed set".into(),
            ));
        }

        Ok(Relay {
            registry,
            blobs,
            scanner,
            master_key,
            ttl_policy: self.ttl_policy,
            limits: self.limits,
            metrics: Arc::new(RelayMetrics::default()),
        })
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
