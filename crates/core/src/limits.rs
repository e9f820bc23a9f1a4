use serde::{Deserialize, Serialize};

/// Size and field bounds applied to uploads before any scanning or
/// storage work happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadLimits {
    /// Maximum plaintext payload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Maximum length of the access password.
    #[serde(default = "default_max_password_length")]
    pub max_password_length: usize,
    /// Maximum length of the stored filename.
    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,
    /// Maximum length of the sender identity string.
    #[serde(default = "default_max_sender_length")]
    pub max_sender_length: usize,
    /// Download budget applied when the sender does not request one.
    /// `None` leaves the budget unbounded.
    #[serde(default = "default_max_downloads")]
    pub default_max_downloads: Option<u32>,
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_max_password_length() -> usize {
    128
}

fn default_max_filename_length() -> usize {
    255
}

fn default_max_sender_length() -> usize {
    254
}

fn default_max_downloads() -> Option<u32> {
    Some(100)
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_password_length: default_max_password_length(),
            max_filename_length: default_max_filename_length(),
            max_sender_length: default_max_sender_length(),
            default_max_downloads: default_max_downloads(),
        }
    }
}
