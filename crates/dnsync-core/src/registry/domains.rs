//! Domain registry
//!
//! Maps every configured domain suffix to its provider zone and the
//! credential scoped to that zone. Built once from configuration and shared
//! (`Arc`) between the record store, the fetcher and the apply executor.

use crate::config::DomainConfig;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Bearer credential for one zone
///
/// `Debug` and `Display` never show the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the Authorization header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<REDACTED>)")
    }
}

/// A provider zone and how to authenticate against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub domain: String,
    pub zone_id: String,
    pub credential: Credential,
}

/// Static domain suffix → zone mapping
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    zones: BTreeMap<String, Zone>,
}

impl DomainRegistry {
    /// Build the registry from configured domains
    ///
    /// Fails on an empty or duplicate domain.
    pub fn new(domains: &[DomainConfig]) -> Result<Self> {
        let mut zones = BTreeMap::new();
        for config in domains {
            if config.domain.is_empty() {
                return Err(Error::config("Domain name cannot be empty"));
            }
            let zone = Zone {
                domain: config.domain.clone(),
                zone_id: config.zone_id.clone(),
                credential: Credential::new(config.api_token.clone()),
            };
            if zones.insert(config.domain.clone(), zone).is_some() {
                return Err(Error::config(format!(
                    "Domain configured twice: {}",
                    config.domain
                )));
            }
        }
        Ok(Self { zones })
    }

    /// Resolve the zone owning a record name, by suffix
    ///
    /// When several configured domains are suffixes of `name` the longest
    /// one wins, so "a.lab.example.com" goes to "lab.example.com" rather
    /// than "example.com" when both are configured.
    pub fn resolve(&self, name: &str) -> Result<&Zone> {
        self.zones
            .values()
            .filter(|zone| name.ends_with(zone.domain.as_str()))
            .max_by_key(|zone| zone.domain.len())
            .ok_or_else(|| Error::unconfigured(name))
    }

    /// Exact lookup by configured domain
    pub fn zone(&self, domain: &str) -> Result<&Zone> {
        self.zones
            .get(domain)
            .ok_or_else(|| Error::unconfigured(domain))
    }

    /// Whether `name` ends with any configured domain
    pub fn is_configured(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// All configured zones, ordered by domain
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// List configured domain names
    pub fn domains(&self) -> Vec<String> {
        self.zones.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
