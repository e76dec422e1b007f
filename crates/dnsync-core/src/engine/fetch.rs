//! Remote state fetcher
//!
//! Pages through every configured zone and returns one consistent snapshot
//! of the managed records. A failure on any page of any zone fails the whole
//! snapshot: callers never see a partial remote state.

use super::retry::with_timeout;
use crate::error::{Error, Result};
use crate::record::RemoteRecord;
use crate::registry::{DomainRegistry, Zone};
use crate::traits::DnsProvider;
use std::time::Duration;
use tracing::{debug, trace};

/// Page size used when nothing else is configured
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Fetch the managed records of every configured zone
pub async fn fetch_all(
    provider: &dyn DnsProvider,
    registry: &DomainRegistry,
    page_size: u32,
    call_timeout: Duration,
) -> Result<Vec<RemoteRecord>> {
    if page_size == 0 {
        return Err(Error::invalid_input("Page size must be greater than 0"));
    }

    let mut records = Vec::new();
    for zone in registry.zones() {
        let zone_records = fetch_zone(provider, zone, page_size, call_timeout)
            .await
            .map_err(|e| Error::fetch(zone.domain.as_str(), e))?;
        debug!(
            "Fetched {} managed records for {}",
            zone_records.len(),
            zone.domain
        );
        records.extend(zone_records);
    }

    Ok(records)
}

/// Page through one zone until a short page signals the end
pub async fn fetch_zone(
    provider: &dyn DnsProvider,
    zone: &Zone,
    page_size: u32,
    call_timeout: Duration,
) -> Result<Vec<RemoteRecord>> {
    let mut records = Vec::new();
    let mut page = 1;

    loop {
        let batch = with_timeout(call_timeout, provider.list_records(zone, page, page_size)).await?;
        let count = batch.len();
        trace!("{} page {}: {} records", zone.domain, page, count);

        // Unsupported types still count towards the page length.
        records.extend(
            batch
                .into_iter()
                .filter_map(|raw| RemoteRecord::from_provider(raw, &zone.domain, &zone.zone_id)),
        );

        if count < page_size as usize {
            break;
        }
        page += 1;
    }

    Ok(records)
}
