use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use parcel_blob::BlobStore;
use parcel_blob_fs::FsBlobStore;
use parcel_blob_memory::MemoryBlobStore;
use parcel_registry::TransferRegistry;
use parcel_registry_memory::MemoryTransferRegistry;
use parcel_relay::{Reaper, ReaperConfig, RelayBuilder};
use parcel_scanner::{ClamdConfig, ClamdScanner, MalwareScanner, ScanError, ScanVerdict};
use parcel_server::api::{self, AppState};
use parcel_server::auth::hash_admin_token;
use parcel_server::config::ParcelConfig;

/// Parcel relay HTTP server.
#[derive(Parser, Debug)]
#[command(name = "parcel-server", about = "Ephemeral encrypted file relay")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "parcel.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hash an admin token for use in parcel.toml. Reads the raw token
    /// from stdin.
    HashToken,
}

/// Pass-through scanner used when scanning is disabled in configuration.
struct DisabledScanner;

#[async_trait::async_trait]
impl MalwareScanner for DisabledScanner {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn scan(&self, _data: &[u8]) -> Result<ScanVerdict, ScanError> {
        Ok(ScanVerdict::Clean)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::HashToken) = cli.command {
        return run_hash_token();
    }

    // Initialize tracing before any other work.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration from the TOML file, or use defaults if the file
    // does not exist.
    let mut config: ParcelConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        ParcelConfig::default()
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // The master key wraps every per-object key. Without a configured
    // key a random one is generated, so stored transfers do not survive
    // a restart.
    let master_key = match std::env::var("PARCEL_MASTER_KEY") {
        Ok(raw) => parcel_crypto::parse_master_key(&raw)
            .map_err(|e| format!("invalid PARCEL_MASTER_KEY: {e}"))?,
        Err(_) => {
            warn!("PARCEL_MASTER_KEY is not set; generated an ephemeral key, stored transfers will not survive a restart");
            parcel_crypto::MasterKey::generate()
        }
    };

    // Metadata registry. In-memory is the only backend; expiry is
    // enforced at read time and reclaimed by the reaper.
    let registry: Arc<dyn TransferRegistry> = Arc::new(MemoryTransferRegistry::new());

    // Blob storage backend.
    let blobs: Arc<dyn BlobStore> = match config.storage.backend.as_str() {
        "fs" => {
            let store = FsBlobStore::open(&config.storage.data_dir).await?;
            info!(data_dir = %config.storage.data_dir, "filesystem blob store initialized");
            Arc::new(store)
        }
        "memory" => Arc::new(MemoryBlobStore::new()),
        other => {
            return Err(format!(
                "storage backend '{other}' is not supported (expected 'fs' or 'memory')"
            )
            .into());
        }
    };

    // Scanner adapter.
    let scanner: Arc<dyn MalwareScanner> = if config.scanner.enabled {
        let scanner = ClamdScanner::new(ClamdConfig {
            host: config.scanner.host.clone(),
            port: config.scanner.port,
            timeout: Duration::from_secs(config.scanner.timeout_seconds),
            chunk_size: config.scanner.chunk_size_bytes,
        });
        match scanner.health_check().await {
            Ok(()) => info!(
                host = %config.scanner.host,
                port = config.scanner.port,
                "scanning engine reachable"
            ),
            Err(e) => warn!(
                error = %e,
                "scanning engine not reachable at startup; uploads will fail until it is"
            ),
        }
        Arc::new(scanner)
    } else {
        warn!("malware scanning is DISABLED; every payload will be accepted unscanned");
        Arc::new(DisabledScanner)
    };

    let relay = Arc::new(
        RelayBuilder::new()
            .registry(Arc::clone(&registry))
            .blobs(Arc::clone(&blobs))
            .scanner(scanner)
            .master_key(master_key)
            .ttl_policy(config.ttl.clone())
            .limits(config.limits.clone())
            .build()?,
    );

    // Spawn the expiration reaper.
    let (reaper, reaper_shutdown) = Reaper::new(
        Arc::clone(&relay),
        ReaperConfig {
            interval: Duration::from_secs(config.reaper.interval_seconds),
            max_purge_attempts: config.reaper.max_purge_attempts,
        },
    );
    tokio::spawn(reaper.run());

    let external_url = config
        .server
        .external_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}", config.server.host, config.server.port));

    // Leave headroom above the payload limit for multipart framing and
    // the other form fields.
    let max_body_bytes = usize::try_from(config.limits.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(1024 * 1024);

    let app = api::router(AppState {
        relay,
        admin_token_sha256: config.admin.token_sha256.clone(),
        external_url,
        max_body_bytes,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "parcel server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the reaper after the listener drains.
    let _ = reaper_shutdown.send(true);
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

fn run_hash_token() -> Result<(), Box<dyn std::error::Error>> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw)?;
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Err("no token provided on stdin".into());
    }
    println!("{}", hash_admin_token(trimmed));
    Ok(())
}
