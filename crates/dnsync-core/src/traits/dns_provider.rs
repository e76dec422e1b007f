// # DNS Provider Trait
//
// Defines the interface to the remote authoritative DNS provider.
//
// ## Implementations
//
// - Cloudflare: `dnsync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::DnsProvider;
//
// let zone = registry.resolve("www.example.com")?;
// let first_page = provider.list_records(zone, 1, 100).await?;
// provider.delete_record(zone, &first_page[0].id).await?;
// ```

use crate::record::{ProviderRecord, RecordData};
use crate::registry::Zone;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for DNS provider implementations
///
/// Every method performs exactly one remote call, authenticated with the
/// zone's credential.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: the apply stage invokes them from
/// several tasks at once.
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the apply stage owns the retry policy)
/// - ❌ Decide whether a call is needed (owned by the differ)
/// - ❌ Access the record store
/// - ❌ Cache remote state between calls
///
/// # Errors
///
/// - [`Error::Transport`](crate::Error::Transport) when the provider could not
///   be reached or the call timed out
/// - [`Error::ProviderResponse`](crate::Error::ProviderResponse) for a non-2xx
///   answer, carrying the response body and the request body
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List one page of a zone's records
    ///
    /// `page` is 1-based. A page shorter than `per_page` is the last one.
    /// Records of every type are returned; filtering is the caller's job.
    async fn list_records(
        &self,
        zone: &Zone,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ProviderRecord>, crate::Error>;

    /// Create a record in the zone
    async fn create_record(&self, zone: &Zone, record: &RecordData) -> Result<(), crate::Error>;

    /// Overwrite the record addressed by `record_id` with `record`
    async fn update_record(
        &self,
        zone: &Zone,
        record_id: &str,
        record: &RecordData,
    ) -> Result<(), crate::Error>;

    /// Delete the record addressed by `record_id`
    async fn delete_record(&self, zone: &Zone, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Arc<dyn DnsProvider>, crate::Error>;
}
