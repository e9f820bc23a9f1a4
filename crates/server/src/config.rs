use serde::Deserialize;

use parcel_core::{TtlPolicy, UploadLimits};

/// Top-level configuration for the Parcel server, loaded from a TOML
/// file. Every section has defaults, so an absent file yields a working
/// single-node setup with in-memory metadata and filesystem blobs.
#[derive(Debug, Default, Deserialize)]
pub struct ParcelConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Blob storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload size and field bounds.
    #[serde(default)]
    pub limits: UploadLimits,
    /// Allowed TTL set and default lifetime.
    #[serde(default)]
    pub ttl: TtlPolicy,
    /// Malware scanning engine configuration.
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Expiration reaper configuration.
    #[serde(default)]
    pub reaper: ReaperSettings,
    /// Admin capability configuration.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// External URL for building retrieval links
    /// (e.g. `https://parcel.example.com`).
    ///
    /// If not set, defaults to `http://{host}:{port}`.
    pub external_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            external_url: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8080
}

/// Configuration for the blob storage backend.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use: `"fs"` or `"memory"`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Directory for the `fs` backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_storage_backend() -> String {
    "fs".to_owned()
}

fn default_data_dir() -> String {
    "uploads".to_owned()
}

/// Configuration for the clamd scanning engine.
#[derive(Debug, Deserialize)]
pub struct ScannerConfig {
    /// Whether uploads are scanned. Disabling this accepts every payload
    /// unscanned and is only meant for development.
    #[serde(default = "default_scanner_enabled")]
    pub enabled: bool,
    /// Engine hostname.
    #[serde(default = "default_scanner_host")]
    pub host: String,
    /// Engine TCP port.
    #[serde(default = "default_scanner_port")]
    pub port: u16,
    /// Bound on each scan call in seconds. A timeout rejects the upload.
    #[serde(default = "default_scanner_timeout")]
    pub timeout_seconds: u64,
    /// Bytes per streamed chunk.
    #[serde(default = "default_scanner_chunk")]
    pub chunk_size_bytes: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scanner_enabled(),
            host: default_scanner_host(),
            port: default_scanner_port(),
            timeout_seconds: default_scanner_timeout(),
            chunk_size_bytes: default_scanner_chunk(),
        }
    }
}

fn default_scanner_enabled() -> bool {
    true
}

fn default_scanner_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_scanner_port() -> u16 {
    3310
}

fn default_scanner_timeout() -> u64 {
    30
}

fn default_scanner_chunk() -> usize {
    64 * 1024
}

/// Configuration for the expiration reaper.
#[derive(Debug, Deserialize)]
pub struct ReaperSettings {
    /// Seconds between sweeps.
    #[serde(default = "default_reaper_interval")]
    pub interval_seconds: u64,
    /// Failed purge attempts per id before the alert escalates.
    #[serde(default = "default_reaper_attempts")]
    pub max_purge_attempts: u32,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_reaper_interval(),
            max_purge_attempts: default_reaper_attempts(),
        }
    }
}

fn default_reaper_interval() -> u64 {
    30
}

fn default_reaper_attempts() -> u32 {
    5
}

/// Admin capability configuration.
#[derive(Debug, Default, Deserialize)]
pub struct AdminConfig {
    /// Lowercase hex SHA-256 of the operator token. Absent disables the
    /// admin surface.
    pub token_sha256: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: ParcelConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, "fs");
        assert!(config.scanner.enabled);
        assert_eq!(config.reaper.interval_seconds, 30);
        assert!(config.admin.token_sha256.is_none());
        assert_eq!(config.ttl.default_seconds, 86_400);
    }

    #[test]
    fn sections_override_defaults() {
        let config: ParcelConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            external_url = "https://parcel.example.com"

            [storage]
            backend = "memory"

            [scanner]
            enabled = false

            [ttl]
            allowed_seconds = [60, 600]
            default_seconds = 60

            [admin]
            token_sha256 = "aabbcc"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.server.external_url.as_deref(),
            Some("https://parcel.example.com")
        );
        assert_eq!(config.storage.backend, "memory");
        assert!(!config.scanner.enabled);
        assert_eq!(config.ttl.allowed_seconds, vec![60, 600]);
        assert_eq!(config.admin.token_sha256.as_deref(), Some("aabbcc"));
    }
}
