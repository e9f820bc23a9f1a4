//! Filesystem [`BlobStore`] backend.
//!
//! Each blob is one file at `{data_dir}/{id}.enc` holding the sealed
//! payload. Ids are validated against a strict character set before any
//! path is built, so a caller-supplied id can never escape the data
//! directory.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use parcel_blob::error::BlobError;
use parcel_blob::store::BlobStore;

/// Suffix for blob files, matching nothing else in the data directory.
const BLOB_SUFFIX: &str = ".enc";

/// Bound on each filesystem operation. A wedged disk surfaces as a
/// storage error instead of a hung request.
const OP_TIMEOUT: Duration = Duration::from_secs(30);

async fn bounded<T>(
    what: &str,
    fut: impl Future<Output = Result<T, BlobError>>,
) -> Result<T, BlobError> {
    tokio::time::timeout(OP_TIMEOUT, fut)
        .await
        .map_err(|_| BlobError::Storage(format!("{what} timed out after {OP_TIMEOUT:?}")))?
}

/// Filesystem-backed blob store.
#[derive(Debug)]
pub struct FsBlobStore {
    data_dir: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `data_dir`, creating the directory if
    /// needed.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| BlobError::Storage(format!("failed to create data dir: {e}")))?;
        Ok(Self { data_dir })
    }

    fn blob_path(&self, id: &str) -> Result<PathBuf, BlobError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(BlobError::InvalidId(id.to_owned()));
        }
        Ok(self.data_dir.join(format!("{id}{BLOB_SUFFIX}")))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, id: &str, data: Bytes) -> Result<(), BlobError> {
        let path = self.blob_path(id)?;

        bounded("blob write", async {
            if let Err(e) = write_durably(&path, &data).await {
                // Never leave a partial file behind after a failed write.
                let _ = tokio::fs::remove_file(&path).await;
                return Err(BlobError::Storage(format!(
                    "failed to write blob {id}: {e}"
                )));
            }
            Ok(())
        })
        .await?;
        tracing::debug!(id, bytes = data.len(), "stored blob");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Bytes>, BlobError> {
        let path = self.blob_path(id)?;
        bounded("blob read", async {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(Bytes::from(data))),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(BlobError::Storage(format!("failed to read blob {id}: {e}"))),
            }
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, BlobError> {
        let path = self.blob_path(id)?;
        bounded("blob delete", async {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(BlobError::Storage(format!(
                    "failed to delete blob {id}: {e}"
                ))),
            }
        })
        .await
    }

    async fn list_ids(&self) -> Result<Vec<String>, BlobError> {
        bounded("blob listing", async {
            let mut entries = tokio::fs::read_dir(&self.data_dir)
                .await
                .map_err(|e| BlobError::Storage(format!("failed to read data dir: {e}")))?;

            let mut ids = Vec::new();
            loop {
                let entry = entries
                    .next_entry()
                    .await
                    .map_err(|e| BlobError::Storage(format!("failed to read data dir: {e}")))?;
                let Some(entry) = entry else { break };
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if let Some(id) = name.strip_suffix(BLOB_SUFFIX) {
                    ids.push(id.to_owned());
                }
            }
            Ok(ids)
        })
        .await
    }
}

/// Write `data` to `path` and fsync before returning.
async fn write_durably(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}
