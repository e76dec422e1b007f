//! Configuration types for dnsync
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main dnsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Domains under management, each with its zone and credential
    pub domains: Vec<DomainConfig>,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl SyncConfig {
    /// Create a configuration for the given domains with defaults elsewhere
    pub fn new(domains: Vec<DomainConfig>) -> Self {
        Self {
            domains,
            provider: ProviderConfig::default(),
            store: StoreConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domains.is_empty() {
            return Err(crate::Error::config("No domains configured"));
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            domain.validate()?;
            if !seen.insert(domain.domain.as_str()) {
                return Err(crate::Error::config(format!(
                    "Domain configured twice: {}",
                    domain.domain
                )));
            }
        }

        self.provider.validate()?;
        self.store.validate()?;
        self.reconciler.validate()?;

        Ok(())
    }
}

/// One managed domain
///
/// The credential is accepted under `jwt` as well, the key used by existing
/// deployments' domain configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain suffix (e.g. "example.com")
    pub domain: String,

    /// Provider zone identifier
    pub zone_id: String,

    /// API token scoped to this zone
    #[serde(alias = "jwt")]
    pub api_token: String,
}

impl DomainConfig {
    pub fn new(
        domain: impl Into<String>,
        zone_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            zone_id: zone_id.into(),
            api_token: api_token.into(),
        }
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("Domain name cannot be empty"));
        }
        if self.zone_id.is_empty() {
            return Err(crate::Error::config(format!(
                "Zone ID for {} cannot be empty",
                self.domain
            )));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config(format!(
                "API token for {} cannot be empty",
                self.domain
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DomainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainConfig")
            .field("domain", &self.domain)
            .field("zone_id", &self.zone_id)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// API base URL override (defaults to the public v4 endpoint)
        #[serde(default)]
        base_url: Option<String>,

        /// HTTP timeout per request in seconds (provider default when unset)
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                base_url,
                timeout_secs,
            } => {
                if *timeout_secs == Some(0) {
                    return Err(crate::Error::config("Provider timeout must be > 0"));
                }
                if let Some(url) = base_url
                    && !url.starts_with("https://")
                    && !url.starts_with("http://")
                {
                    return Err(crate::Error::config(format!(
                        "Provider base URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Cloudflare {
            base_url: None,
            timeout_secs: None,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Store file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// What happens to tombstoned records once a pass has applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgePolicy {
    /// Purge every tombstone after the apply stage, whatever its outcome
    #[default]
    Always,
    /// Purge only tombstones whose remote deletion succeeded or was not needed
    OnSuccess,
}

impl std::str::FromStr for PurgePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(PurgePolicy::Always),
            "on_success" | "on-success" => Ok(PurgePolicy::OnSuccess),
            other => Err(crate::Error::config(format!(
                "Unknown purge policy '{}'. Valid: always, on_success",
                other
            ))),
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds between the start of two passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Records requested per list call
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum provider calls in flight during the apply stage
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Upper bound for a single provider call (in seconds)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Only reconcile (and purge) records of this owner
    #[serde(default)]
    pub owner: Option<String>,

    /// Tombstone purge behavior after the apply stage
    #[serde(default)]
    pub purge_policy: PurgePolicy,

    /// Extra attempts for a failed apply call (0 = single attempt)
    #[serde(default)]
    pub max_retries: usize,

    /// Backoff before the first retry (in milliseconds), doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Accept record names outside the configured domains at the store boundary
    #[serde(default)]
    pub accept_unconfigured_domains: bool,

    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Reconcile interval must be > 0"));
        }
        if self.page_size == 0 {
            return Err(crate::Error::config("Page size must be > 0"));
        }
        if self.max_concurrency == 0 {
            return Err(crate::Error::config("Max concurrency must be > 0"));
        }
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("Call timeout must be > 0"));
        }
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "Max retries must be between 0 and 10. Got: {}",
                self.max_retries
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            page_size: default_page_size(),
            max_concurrency: default_max_concurrency(),
            call_timeout_secs: default_call_timeout_secs(),
            owner: None,
            purge_policy: PurgePolicy::default(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            accept_unconfigured_domains: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_max_concurrency() -> usize {
    16
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_event_channel_capacity() -> usize {
    1000
}
