//! DNS record model
//!
//! Three shapes of the same record:
//! - [`DesiredRecord`]: what the store declares
//! - [`RemoteRecord`]: what the provider holds, as seen by one pass
//! - [`ProviderRecord`]: raw wire shape returned by a [`DnsProvider`](crate::DnsProvider)
//!
//! All three share the comparable field set [`RecordData`].

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record types managed by the reconciler
///
/// Anything else the provider returns (MX, TXT, ...) is invisible to
/// reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
    /// Canonical name record
    #[serde(rename = "CNAME")]
    Cname,
}

impl RecordType {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "CNAME" => Ok(RecordType::Cname),
            other => Err(crate::Error::invalid_input(format!(
                "Unsupported record type: {}",
                other
            ))),
        }
    }
}

/// The fields that define a record's content on the provider
///
/// `ttl` stays a string so provider sentinels ("1" meaning automatic on
/// Cloudflare) survive untouched. `==` on this type is [`is_equivalent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    #[serde(deserialize_with = "ttl_as_string")]
    pub ttl: String,
    pub proxied: bool,
}

impl RecordData {
    pub fn new(
        record_type: RecordType,
        name: impl Into<String>,
        content: impl Into<String>,
        ttl: impl Into<String>,
        proxied: bool,
    ) -> Self {
        Self {
            record_type,
            name: name.into(),
            content: content.into(),
            ttl: ttl.into(),
            proxied,
        }
    }
}

/// Structural equivalence used for diffing
///
/// Two records are equivalent iff type, name, content, ttl and proxied are
/// all equal. Owner, provider id and the tombstone flag never take part.
pub fn is_equivalent(a: &RecordData, b: &RecordData) -> bool {
    a.record_type == b.record_type
        && a.name == b.name
        && a.content == b.content
        && a.ttl == b.ttl
        && a.proxied == b.proxied
}

/// A record as declared in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredRecord {
    #[serde(flatten)]
    pub data: RecordData,
    pub owner: String,
    #[serde(default)]
    pub to_delete: bool,
}

impl DesiredRecord {
    /// Create a live (not tombstoned) record
    pub fn new(data: RecordData, owner: impl Into<String>) -> Self {
        Self {
            data,
            owner: owner.into(),
            to_delete: false,
        }
    }

    /// Mark the record for deletion
    pub fn tombstoned(mut self) -> Self {
        self.to_delete = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }
}

/// A record as held by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub data: RecordData,
    /// Provider-assigned identifier, addresses update and delete calls
    pub id: String,
    /// Zone the record was listed from
    pub zone_id: String,
    /// Configured domain owning that zone
    pub domain: String,
}

impl RemoteRecord {
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Convert a raw provider record listed from `domain`/`zone_id`
    ///
    /// Returns `None` for record types the reconciler does not manage.
    pub fn from_provider(record: ProviderRecord, domain: &str, zone_id: &str) -> Option<Self> {
        let record_type = record.record_type.parse::<RecordType>().ok()?;
        Some(Self {
            data: RecordData {
                record_type,
                name: record.name,
                content: record.content,
                ttl: record.ttl,
                proxied: record.proxied,
            },
            id: record.id,
            zone_id: zone_id.to_string(),
            domain: domain.to_string(),
        })
    }
}

impl PartialEq for RecordData {
    fn eq(&self, other: &Self) -> bool {
        is_equivalent(self, other)
    }
}

impl Eq for RecordData {}

/// Raw record as listed by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_ttl", deserialize_with = "ttl_as_string")]
    pub ttl: String,
    #[serde(default)]
    pub proxied: bool,
}

fn default_ttl() -> String {
    "1".to_string()
}

/// Accept a ttl given either as a JSON number or a string
fn ttl_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ttl {
        Number(u64),
        Text(String),
    }

    Ok(match Ttl::deserialize(deserializer)? {
        Ttl::Number(n) => n.to_string(),
        Ttl::Text(s) => s,
    })
}
