// # dnsyncd - DNS Reconciliation Daemon
//
// This is a THIN integration layer: all reconciliation logic lives in
// dnsync-core. Configuration is via environment variables only.
//
// The dnsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime
// 3. Registering providers and opening the record store
// 4. Running the reconciler until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Domains
// - `DNSYNC_DOMAIN_CONFIG`: JSON object mapping each domain to its zone and
//   token, e.g. `{"example.com": {"zone_id": "...", "jwt": "..."}}`
//
// ### DNS Provider
// - `DNSYNC_PROVIDER_TYPE`: Provider type (cloudflare)
// - `DNSYNC_PROVIDER_BASE_URL`: API root override (optional)
// - `DNSYNC_MODE`: `dry-run` to log mutations instead of sending them
//
// ### Record Store
// - `DNSYNC_STORE_TYPE`: Type of record store (file, memory)
// - `DNSYNC_STORE_PATH`: Path to the records file (for file store)
//
// ### Reconciler
// - `DNSYNC_INTERVAL_SECS`: Seconds between passes
// - `DNSYNC_PAGE_SIZE`: Records per list call
// - `DNSYNC_MAX_CONCURRENCY`: Provider calls in flight while applying
// - `DNSYNC_CALL_TIMEOUT_SECS`: Upper bound per provider call
// - `DNSYNC_OWNER`: Only reconcile records of this owner
// - `DNSYNC_PURGE_POLICY`: always, on_success
// - `DNSYNC_MAX_RETRIES`: Extra attempts for transient failures
// - `DNSYNC_RETRY_BACKOFF_MS`: Backoff before the first retry
// - `DNSYNC_ACCEPT_UNCONFIGURED_DOMAINS`: Accept records outside the configured domains
//
// ## Example
//
// ```bash
// export DNSYNC_DOMAIN_CONFIG='{"example.com": {"zone_id": "023e105f4ecef8ad9ca31a8372d0c353", "jwt": "your_token"}}'
// export DNSYNC_STORE_TYPE=file
// export DNSYNC_STORE_PATH=/var/lib/dnsync/records.json
//
// dnsyncd
// ```

use anyhow::{Context, Result};
use dnsync_core::config::{
    DomainConfig, ProviderConfig, PurgePolicy, ReconcilerConfig, StoreConfig, SyncConfig,
};
use dnsync_core::engine::ReconcileEvent;
use dnsync_core::state::{FileRecordStore, MemoryRecordStore, NameValidator};
use dnsync_core::traits::RecordStore;
use dnsync_core::{DomainRegistry, ProviderRegistry, Reconciler};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Time allowed for a pass in flight to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(120);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DnsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DnsyncExitCode> for ExitCode {
    fn from(code: DnsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    domains: Vec<DomainConfig>,
    provider_type: String,
    provider_base_url: Option<String>,
    store_type: String,
    store_path: String,
    reconciler: ReconcilerConfig,
    log_level: String,
}

/// Read and parse an optional environment variable
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, value, e)),
        _ => Ok(None),
    }
}

/// Parse `{"<domain>": {"zone_id": "...", "jwt": "..."}}`
fn parse_domain_config(raw: &str) -> Result<Vec<DomainConfig>> {
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).context("DNSYNC_DOMAIN_CONFIG is not a JSON object")?;

    object
        .into_iter()
        .map(|(domain, mut entry)| {
            let fields = entry.as_object_mut().ok_or_else(|| {
                anyhow::anyhow!("DNSYNC_DOMAIN_CONFIG entry for {} is not an object", domain)
            })?;
            fields.insert("domain".to_string(), serde_json::Value::String(domain.clone()));
            serde_json::from_value(entry)
                .with_context(|| format!("Invalid DNSYNC_DOMAIN_CONFIG entry for {}", domain))
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let raw_domains = env::var("DNSYNC_DOMAIN_CONFIG").context(
            "DNSYNC_DOMAIN_CONFIG is required. \
            Set it via: export DNSYNC_DOMAIN_CONFIG='{\"example.com\": {\"zone_id\": \"...\", \"jwt\": \"...\"}}'",
        )?;

        let defaults = ReconcilerConfig::default();
        let reconciler = ReconcilerConfig {
            interval_secs: env_parse("DNSYNC_INTERVAL_SECS")?.unwrap_or(defaults.interval_secs),
            page_size: env_parse("DNSYNC_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            max_concurrency: env_parse("DNSYNC_MAX_CONCURRENCY")?
                .unwrap_or(defaults.max_concurrency),
            call_timeout_secs: env_parse("DNSYNC_CALL_TIMEOUT_SECS")?
                .unwrap_or(defaults.call_timeout_secs),
            owner: env::var("DNSYNC_OWNER").ok().filter(|s| !s.is_empty()),
            purge_policy: env_parse::<PurgePolicy>("DNSYNC_PURGE_POLICY")?
                .unwrap_or(defaults.purge_policy),
            max_retries: env_parse("DNSYNC_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_backoff_ms: env_parse("DNSYNC_RETRY_BACKOFF_MS")?
                .unwrap_or(defaults.retry_backoff_ms),
            accept_unconfigured_domains: env_parse("DNSYNC_ACCEPT_UNCONFIGURED_DOMAINS")?
                .unwrap_or(defaults.accept_unconfigured_domains),
            event_channel_capacity: defaults.event_channel_capacity,
        };

        Ok(Self {
            domains: parse_domain_config(&raw_domains)?,
            provider_type: env::var("DNSYNC_PROVIDER_TYPE")
                .unwrap_or_else(|_| "cloudflare".to_string()),
            provider_base_url: env::var("DNSYNC_PROVIDER_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            store_type: env::var("DNSYNC_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("DNSYNC_STORE_PATH")
                .unwrap_or_else(|_| "./data/records.json".to_string()),
            reconciler,
            log_level: env::var("DNSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks what only the daemon knows about (type names, URL schemes, log
    /// level); the assembled [`SyncConfig`] validates the rest.
    fn validate(&self) -> Result<()> {
        // Validate provider type
        match self.provider_type.as_str() {
            "cloudflare" => {}
            _ => anyhow::bail!(
                "DNSYNC_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                self.provider_type
            ),
        }

        if let Some(ref url) = self.provider_base_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!(
                    "DNSYNC_PROVIDER_BASE_URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                );
            }
            if url.starts_with("http://") {
                eprintln!(
                    "WARNING: DNSYNC_PROVIDER_BASE_URL uses HTTP (not HTTPS). \
                    Zone tokens will be sent in clear text."
                );
            }
        }

        // Validate store type
        match self.store_type.as_str() {
            "file" => {
                if self.store_path.is_empty() {
                    anyhow::bail!(
                        "DNSYNC_STORE_PATH cannot be empty when DNSYNC_STORE_TYPE=file"
                    );
                }
            }
            "memory" => {}
            _ => anyhow::bail!(
                "DNSYNC_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        // Check for obvious placeholder tokens (common mistake)
        for domain in &self.domains {
            let token_lower = domain.api_token.to_lowercase();
            if token_lower.contains("your_token") || token_lower.contains("replace_me") {
                anyhow::bail!(
                    "Token for {} appears to be a placeholder. \
                    Use an actual API token from your DNS provider.",
                    domain.domain
                );
            }
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DNSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Assemble the library configuration
    fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            domains: self.domains.clone(),
            provider: ProviderConfig::Cloudflare {
                base_url: self.provider_base_url.clone(),
                timeout_secs: Some(self.reconciler.call_timeout_secs),
            },
            store: match self.store_type.as_str() {
                "memory" => StoreConfig::Memory,
                _ => StoreConfig::File {
                    path: self.store_path.clone(),
                },
            },
            reconciler: self.reconciler.clone(),
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    let sync_config = config.to_sync_config();
    if let Err(e) = sync_config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    info!("Starting dnsyncd daemon");
    info!(
        "Configuration loaded: {} domain(s)",
        sync_config.domains.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(sync_config).await {
            error!("Daemon error: {:#}", e);
            DnsyncExitCode::RuntimeError
        } else {
            DnsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: SyncConfig) -> Result<()> {
    // Create provider registry
    let providers = ProviderRegistry::new();

    // Register built-in providers
    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        dnsync_provider_cloudflare::register(&providers);
    }

    let provider = providers
        .create_provider(&config.provider)
        .context("Failed to create DNS provider")?;
    info!("Provider: {}", provider.provider_name());

    let domains = Arc::new(DomainRegistry::new(&config.domains)?);
    for domain in domains.domains() {
        info!("Managing domain: {}", domain);
    }

    let validator = NameValidator::new(
        Arc::clone(&domains),
        config.reconciler.accept_unconfigured_domains,
    );
    let store: Arc<dyn RecordStore> = match &config.store {
        StoreConfig::File { path } => {
            info!("Record store: file ({})", path);
            Arc::new(
                FileRecordStore::new(path, validator)
                    .await
                    .with_context(|| format!("Failed to open record store at {}", path))?,
            )
        }
        StoreConfig::Memory => {
            warn!("Record store: memory (declared records are lost on restart)");
            Arc::new(MemoryRecordStore::with_validator(validator))
        }
    };

    let (reconciler, mut events) =
        Reconciler::new(provider, store, domains, config.reconciler.clone())?;

    // Drain events into the log; ends when the reconciler is dropped.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ReconcileEvent::PassFinished { report } if report.failed > 0 => {
                    warn!("{} provider call(s) failed this pass", report.failed)
                }
                other => debug!("Event: {:?}", other),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run = reconciler.run_with_shutdown(Some(shutdown_rx));
    tokio::pin!(run);

    info!("Daemon initialized successfully");

    tokio::select! {
        result = &mut run => {
            result?;
            return Ok(());
        }
        signal = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", signal?);
            info!("Shutting down daemon");
            let _ = shutdown_tx.send(());
        }
    }

    // A pass in flight finishes before the loop returns.
    match tokio::time::timeout(SHUTDOWN_GRACE, run).await {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_GRACE),
    }

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
