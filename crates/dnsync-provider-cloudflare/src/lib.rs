// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for dnsync.
//
// Every trait method maps to exactly one Cloudflare API v4 call:
//
// - List:   GET    `/zones/:zone_id/dns_records?page=n&per_page=k`
// - Create: POST   `/zones/:zone_id/dns_records`
// - Update: PUT    `/zones/:zone_id/dns_records/:record_id`
// - Delete: DELETE `/zones/:zone_id/dns_records/:record_id`
//
// Requests authenticate with the bearer token of the zone they address.
//
// ## Architectural Constraints
//
// Providers are **untrusted** components with strict limitations:
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
// - ✅ Parse provider-specific responses
//
// **Forbidden Capabilities** (enforced by code review):
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic (owned by the apply executor)
// - ❌ Access the record store
// - ❌ Decide whether a call is needed (owned by the differ)
// - ❌ Cache zone contents between calls
//
// ## Security Requirements
//
// - Zone tokens NEVER appear in logs or errors
// - Tokens come from the domain configuration only
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/

use async_trait::async_trait;
use dnsync_core::config::ProviderConfig;
use dnsync_core::record::{ProviderRecord, RecordData};
use dnsync_core::registry::Zone;
use dnsync_core::traits::{DnsProvider, DnsProviderFactory};
use dnsync_core::{Error, ProviderRegistry, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare DNS provider
///
/// Stateless apart from its HTTP client: credentials travel with each
/// [`Zone`].
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform list requests
/// - Log the intended POST/PUT/DELETE with its payload
/// - **NOT** actually modify DNS records
#[derive(Clone)]
pub struct CloudflareProvider {
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform list requests but skip mutations
    dry_run: bool,

    timeout: Duration,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct ListResponse {
    result: Vec<ProviderRecord>,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `base_url`: API root, [`CLOUDFLARE_API_BASE`] when `None`
    /// - `timeout`: HTTP timeout per request
    /// - `dry_run`: If true, perform list requests but skip mutations
    pub fn new(base_url: Option<String>, timeout: Duration, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::provider("cloudflare", format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url
            .unwrap_or_else(|| CLOUDFLARE_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(Error::config("Cloudflare base URL cannot be empty"));
        }

        Ok(Self {
            base_url,
            client,
            dry_run,
            timeout,
        })
    }

    /// Create a provider against the public API (live mode)
    pub fn new_live() -> Result<Self> {
        Self::new(None, DEFAULT_HTTP_TIMEOUT, false)
    }

    /// Create a provider against the public API (dry-run mode)
    pub fn new_dry_run() -> Result<Self> {
        Self::new(None, DEFAULT_HTTP_TIMEOUT, true)
    }

    /// HTTP timeout applied to every request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self, zone: &Zone) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone.zone_id)
    }

    fn record_url(&self, zone: &Zone, record_id: &str) -> String {
        format!("{}/{}", self.records_url(zone), record_id)
    }

    /// Send a request, mapping failures to transport or provider errors
    ///
    /// `payload` is only used to describe the request in a provider error.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        zone: &Zone,
        payload: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(zone.credential.expose())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        match status.as_u16() {
            401 | 403 => tracing::warn!(
                "Cloudflare rejected the token for zone {} ({})",
                zone.domain,
                status
            ),
            429 => tracing::warn!("Cloudflare rate limit exceeded for zone {}", zone.domain),
            _ => {}
        }

        Err(Error::provider_response(
            status.as_u16(),
            body,
            payload.map(Value::to_string),
        ))
    }

    async fn mutate(
        &self,
        request: reqwest::RequestBuilder,
        description: String,
        zone: &Zone,
        payload: Option<Value>,
    ) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send {} with payload: {}",
                description,
                payload.as_ref().map(serde_json::Value::to_string).unwrap_or_default()
            );
            return Ok(());
        }

        let request = match &payload {
            Some(body) => request.json(body),
            None => request,
        };
        self.send(request, zone, payload.as_ref()).await?;
        tracing::debug!("{} succeeded", description);
        Ok(())
    }
}

/// Request body for create and update
///
/// `ttl` goes out as a number when it is one; anything else is passed through.
fn record_payload(record: &RecordData) -> Value {
    let ttl = record
        .ttl
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(record.ttl.clone()));

    serde_json::json!({
        "type": record.record_type.as_str(),
        "name": record.name,
        "content": record.content,
        "ttl": ttl,
        "proxied": record.proxied,
    })
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_records(&self, zone: &Zone, page: u32, per_page: u32) -> Result<Vec<ProviderRecord>> {
        tracing::debug!("Listing {} page {} ({} per page)", zone.domain, page, per_page);

        let request = self
            .client
            .get(self.records_url(zone))
            .query(&[("page", page), ("per_page", per_page)]);
        let response = self.send(request, zone, None).await?;

        let list: ListResponse = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("Failed to parse list response: {}", e))
        })?;
        Ok(list.result)
    }

    async fn create_record(&self, zone: &Zone, record: &RecordData) -> Result<()> {
        let url = self.records_url(zone);
        let description = format!("POST {}", url);
        self.mutate(
            self.client.post(url),
            description,
            zone,
            Some(record_payload(record)),
        )
        .await
    }

    async fn update_record(&self, zone: &Zone, record_id: &str, record: &RecordData) -> Result<()> {
        let url = self.record_url(zone, record_id);
        let description = format!("PUT {}", url);
        self.mutate(
            self.client.put(url),
            description,
            zone,
            Some(record_payload(record)),
        )
        .await
    }

    async fn delete_record(&self, zone: &Zone, record_id: &str) -> Result<()> {
        let url = self.record_url(zone, record_id);
        let description = format!("DELETE {}", url);
        self.mutate(self.client.delete(url), description, zone, None)
            .await
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl CloudflareFactory {
    /// Build a provider from configuration
    ///
    /// The HTTP timeout follows `timeout_secs` when set, so it never cuts a
    /// call shorter than the reconciler's own per-call timeout.
    pub fn build(&self, config: &ProviderConfig) -> Result<CloudflareProvider> {
        match config {
            ProviderConfig::Cloudflare {
                base_url,
                timeout_secs,
            } => {
                // Check for dry-run mode environment variable
                let dry_run = std::env::var("DNSYNC_MODE")
                    .unwrap_or_default()
                    .to_lowercase()
                    == "dry-run";

                if dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                let timeout = timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT);
                CloudflareProvider::new(base_url.clone(), timeout, dry_run)
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        Ok(Arc::new(self.build(config)?))
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use dnsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dnsync_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnsync_core::record::RecordType;
    use dnsync_core::registry::Credential;

    fn zone() -> Zone {
        Zone {
            domain: "example.com".to_string(),
            zone_id: "023e105f4ecef8ad9ca31a8372d0c353".to_string(),
            credential: Credential::new("secret_token_12345"),
        }
    }

    #[test]
    fn test_factory_creation() {
        let factory = CloudflareFactory;
        let config = ProviderConfig::Cloudflare {
            base_url: None,
            timeout_secs: None,
        };

        let provider = factory.create(&config).unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
    }

    #[test]
    fn test_factory_http_timeout_follows_config() {
        let default = CloudflareFactory
            .build(&ProviderConfig::Cloudflare {
                base_url: None,
                timeout_secs: None,
            })
            .unwrap();
        assert_eq!(default.timeout(), DEFAULT_HTTP_TIMEOUT);

        let long = CloudflareFactory
            .build(&ProviderConfig::Cloudflare {
                base_url: None,
                timeout_secs: Some(90),
            })
            .unwrap();
        assert_eq!(long.timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = ProviderConfig::Custom {
            factory: "other".to_string(),
            config: serde_json::json!({}),
        };
        assert!(CloudflareFactory.create(&config).is_err());
    }

    #[test]
    fn test_dry_run_mode() {
        assert!(CloudflareProvider::new_dry_run().unwrap().is_dry_run());
        assert!(!CloudflareProvider::new_live().unwrap().is_dry_run());
    }

    #[test]
    fn test_urls() {
        let provider = CloudflareProvider::new(
            Some("http://localhost:8080/client/v4/".to_string()),
            DEFAULT_HTTP_TIMEOUT,
            false,
        )
        .unwrap();

        assert_eq!(
            provider.record_url(&zone(), "R1"),
            "http://localhost:8080/client/v4/zones/023e105f4ecef8ad9ca31a8372d0c353/dns_records/R1"
        );
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(CloudflareProvider::new(Some("/".to_string()), DEFAULT_HTTP_TIMEOUT, false).is_err());
    }

    #[test]
    fn test_record_payload() {
        let record = RecordData::new(RecordType::Aaaa, "v6.example.com", "2001:db8::1", "300", false);
        assert_eq!(
            record_payload(&record),
            serde_json::json!({
                "type": "AAAA",
                "name": "v6.example.com",
                "content": "2001:db8::1",
                "ttl": 300,
                "proxied": false,
            })
        );

        let auto = RecordData::new(RecordType::A, "a.example.com", "1.2.3.4", "auto", true);
        assert_eq!(record_payload(&auto)["ttl"], "auto");
    }

    #[test]
    fn test_zone_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new_live().unwrap();
        let zone = zone();

        let debug_str = format!("{:?} {:?}", provider, zone);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("CloudflareProvider"));
    }
}
