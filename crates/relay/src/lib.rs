pub mod builder;
pub mod error;
pub mod metrics;
pub mod reaper;
pub mod relay;

pub use builder::RelayBuilder;
pub use error::TransferError;
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use reaper::{Reaper, ReaperConfig};
pub use relay::{CheckStatus, DownloadPayload, Relay, TransferSummary, UploadReceipt, UploadRequest};
