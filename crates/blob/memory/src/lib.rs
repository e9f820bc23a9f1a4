use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use parcel_blob::error::BlobError;
use parcel_blob::store::BlobStore;

/// In-memory [`BlobStore`] backed by a [`DashMap`].
///
/// Suitable for tests and single-node development; contents do not
/// survive a restart.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    /// Create a new, empty in-memory blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: &str, data: Bytes) -> Result<(), BlobError> {
        self.blobs.insert(id.to_owned(), data);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Bytes>, BlobError> {
        Ok(self.blobs.get(id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.remove(id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<String>, BlobError> {
        Ok(self.blobs.iter().map(|entry| entry.key().clone()).collect())
    }
}
