use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The id contains characters the backend refuses to turn into a
    /// storage location.
    #[error("invalid blob id: {0}")]
    InvalidId(String),

    /// A storage backend error occurred.
    #[error("blob storage error: {0}")]
    Storage(String),
}
