pub mod error;
pub mod store;

pub use error::RegistryError;
pub use store::{DownloadGrant, TransferRegistry};
