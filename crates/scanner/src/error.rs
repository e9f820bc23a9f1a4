use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a scanning engine.
///
/// A detection is not an error — it is a [`ScanVerdict`]. These variants
/// all mean the scan did not complete, and none of them may be treated
/// as a pass.
///
/// [`ScanVerdict`]: crate::scanner::ScanVerdict
#[derive(Debug, Error)]
pub enum ScanError {
    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The engine did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The engine replied with something outside the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ScanError {
    /// Returns `true` if the error is transient and the scan may succeed
    /// on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}
