use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;

/// Pluggable storage backend for sealed payload bytes.
///
/// Blobs hold ciphertext only; the registry record under the same id
/// carries everything needed to open them. Writes are whole-object and
/// append-only — there is no partial update, only `put` and `delete`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under the given id. The write must be durable before
    /// this returns `Ok`.
    async fn put(&self, id: &str, data: Bytes) -> Result<(), BlobError>;

    /// Retrieve a blob by id. Returns `None` if absent.
    async fn get(&self, id: &str) -> Result<Option<Bytes>, BlobError>;

    /// Delete a blob by id. Returns `true` if it existed; deleting an
    /// already-absent blob is not an error.
    async fn delete(&self, id: &str) -> Result<bool, BlobError>;

    /// All blob ids currently stored, for the reaper's orphan sweep.
    async fn list_ids(&self) -> Result<Vec<String>, BlobError>;
}
