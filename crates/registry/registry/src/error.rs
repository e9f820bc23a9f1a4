use thiserror::Error;

/// Errors from transfer registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
