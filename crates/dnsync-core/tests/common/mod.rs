//! Test doubles and common utilities for reconciliation contract tests
//!
//! The stub provider keeps an in-memory copy of each zone and applies the
//! mutations it receives, so consecutive passes observe their own effects.

#![allow(dead_code)]

use async_trait::async_trait;
use dnsync_core::config::{DomainConfig, ReconcilerConfig};
use dnsync_core::error::{Error, Result};
use dnsync_core::record::{DesiredRecord, ProviderRecord, RecordData, RecordType};
use dnsync_core::registry::{DomainRegistry, Zone};
use dnsync_core::state::MemoryRecordStore;
use dnsync_core::traits::{DnsProvider, RecordStore};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provider call as received by [`StubProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List {
        zone_id: String,
        page: u32,
        per_page: u32,
    },
    Create {
        zone_id: String,
        token: String,
        record: RecordData,
    },
    Update {
        zone_id: String,
        record_id: String,
        record: RecordData,
    },
    Delete {
        zone_id: String,
        record_id: String,
    },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::List { .. })
    }
}

/// How an injected failure surfaces
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Non-2xx answer with this status
    Status(u16),
    /// Provider unreachable
    Transport,
    /// Call never answers
    Hang,
}

/// A DnsProvider backed by in-memory zones
pub struct StubProvider {
    zones: Mutex<HashMap<String, Vec<ProviderRecord>>>,
    calls: Mutex<Vec<Call>>,
    list_call_count: Arc<AtomicUsize>,
    mutation_call_count: Arc<AtomicUsize>,
    next_id: AtomicUsize,
    /// Mutations on these names fail
    failing_names: Mutex<HashMap<String, Failure>>,
    /// Listing these zones fails
    failing_zones: Mutex<HashSet<String>>,
    /// Fail the first N mutation attempts with a 503, then succeed
    transient_failures: AtomicUsize,
    list_delay: Duration,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            zones: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            mutation_call_count: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicUsize::new(1),
            failing_names: Mutex::new(HashMap::new()),
            failing_zones: Mutex::new(HashSet::new()),
            transient_failures: AtomicUsize::new(0),
            list_delay: Duration::ZERO,
        }
    }

    /// Delay every list call, keeping a pass in flight
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Seed a remote record
    pub fn insert(&self, zone_id: &str, record: ProviderRecord) {
        self.zones
            .lock()
            .unwrap()
            .entry(zone_id.to_string())
            .or_default()
            .push(record);
    }

    /// Seed a managed remote record
    pub fn insert_data(&self, zone_id: &str, id: &str, data: &RecordData) {
        self.insert(
            zone_id,
            ProviderRecord {
                id: id.to_string(),
                record_type: data.record_type.to_string(),
                name: data.name.clone(),
                content: data.content.clone(),
                ttl: data.ttl.clone(),
                proxied: data.proxied,
            },
        );
    }

    /// Seed `count` A records named `host{n}.{domain}`
    pub fn fill(&self, zone_id: &str, domain: &str, count: usize) {
        for n in 0..count {
            let data = a_record(&format!("host{}.{}", n, domain), "10.0.0.1");
            self.insert_data(zone_id, &format!("{}-{}", zone_id, n), &data);
        }
    }

    pub fn fail_mutations_for(&self, name: &str, failure: Failure) {
        self.failing_names
            .lock()
            .unwrap()
            .insert(name.to_string(), failure);
    }

    pub fn fail_listing(&self, zone_id: &str) {
        self.failing_zones.lock().unwrap().insert(zone_id.to_string());
    }

    pub fn fail_next_mutations(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Get the number of times list_records() was called
    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of create/update/delete calls
    pub fn mutation_call_count(&self) -> usize {
        self.mutation_call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Current remote records of a zone
    pub fn records(&self, zone_id: &str) -> Vec<ProviderRecord> {
        self.zones
            .lock()
            .unwrap()
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn remote(&self, zone_id: &str, name: &str) -> Option<ProviderRecord> {
        self.records(zone_id).into_iter().find(|r| r.name == name)
    }

    async fn mutation(&self, call: Call, name: &str) -> Result<()> {
        self.mutation_call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);

        let failure = self.failing_names.lock().unwrap().get(name).copied();
        match failure {
            Some(Failure::Status(status)) => {
                return Err(Error::provider_response(
                    status,
                    r#"{"success":false}"#,
                    Some(format!(r#"{{"name":"{}"}}"#, name)),
                ));
            }
            Some(Failure::Transport) => return Err(Error::transport("connection refused")),
            Some(Failure::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::provider_response(503, "unavailable", None));
        }
        Ok(())
    }
}

fn wire(id: String, record: &RecordData) -> ProviderRecord {
    ProviderRecord {
        id,
        record_type: record.record_type.to_string(),
        name: record.name.clone(),
        content: record.content.clone(),
        ttl: record.ttl.clone(),
        proxied: record.proxied,
    }
}

#[async_trait]
impl DnsProvider for StubProvider {
    async fn list_records(&self, zone: &Zone, page: u32, per_page: u32) -> Result<Vec<ProviderRecord>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call::List {
            zone_id: zone.zone_id.clone(),
            page,
            per_page,
        });

        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        if self.failing_zones.lock().unwrap().contains(&zone.zone_id) {
            return Err(Error::transport("connection reset"));
        }

        let start = (page.saturating_sub(1) * per_page) as usize;
        Ok(self
            .records(&zone.zone_id)
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect())
    }

    async fn create_record(&self, zone: &Zone, record: &RecordData) -> Result<()> {
        let call = Call::Create {
            zone_id: zone.zone_id.clone(),
            token: zone.credential.expose().to_string(),
            record: record.clone(),
        };
        self.mutation(call, &record.name).await?;

        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.insert(&zone.zone_id, wire(id, record));
        Ok(())
    }

    async fn update_record(&self, zone: &Zone, record_id: &str, record: &RecordData) -> Result<()> {
        let call = Call::Update {
            zone_id: zone.zone_id.clone(),
            record_id: record_id.to_string(),
            record: record.clone(),
        };
        self.mutation(call, &record.name).await?;

        let mut zones = self.zones.lock().unwrap();
        let records = zones.entry(zone.zone_id.clone()).or_default();
        match records.iter_mut().find(|r| r.id == record_id) {
            Some(existing) => {
                *existing = wire(record_id.to_string(), record);
                Ok(())
            }
            None => Err(Error::provider_response(404, "record not found", None)),
        }
    }

    async fn delete_record(&self, zone: &Zone, record_id: &str) -> Result<()> {
        let name = self
            .records(&zone.zone_id)
            .into_iter()
            .find(|r| r.id == record_id)
            .map(|r| r.name)
            .unwrap_or_default();
        let call = Call::Delete {
            zone_id: zone.zone_id.clone(),
            record_id: record_id.to_string(),
        };
        self.mutation(call, &name).await?;

        let mut zones = self.zones.lock().unwrap();
        if let Some(records) = zones.get_mut(&zone.zone_id) {
            records.retain(|r| r.id != record_id);
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

/// A RecordStore wrapper that counts cleanup and flush calls
pub struct CountingStore {
    inner: MemoryRecordStore,
    purge_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            purge_call_count: Arc::new(AtomicUsize::new(0)),
            flush_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of purge_tombstones*() calls
    pub fn purge_call_count(&self) -> usize {
        self.purge_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times flush() was called
    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn list_desired(&self, owner: Option<&str>) -> Result<Vec<DesiredRecord>> {
        self.inner.list_desired(owner).await
    }

    async fn purge_tombstones(&self, owner: Option<&str>) -> Result<usize> {
        self.purge_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.purge_tombstones(owner).await
    }

    async fn purge_tombstones_named(&self, names: &[String]) -> Result<usize> {
        self.purge_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.purge_tombstones_named(names).await
    }

    async fn get(&self, name: &str) -> Result<Option<DesiredRecord>> {
        self.inner.get(name).await
    }

    async fn upsert(&self, record: DesiredRecord) -> Result<DesiredRecord> {
        self.inner.upsert(record).await
    }

    async fn upsert_many(&self, records: Vec<DesiredRecord>) -> Result<Vec<DesiredRecord>> {
        self.inner.upsert_many(records).await
    }

    async fn soft_delete(&self, name: &str) -> Result<()> {
        self.inner.soft_delete(name).await
    }

    async fn soft_delete_all(&self, owner: Option<&str>) -> Result<usize> {
        self.inner.soft_delete_all(owner).await
    }

    async fn soft_replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>> {
        self.inner.soft_replace_all(records, owner).await
    }

    async fn replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>> {
        self.inner.replace_all(records, owner).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name).await
    }

    async fn delete_all(&self, owner: Option<&str>) -> Result<usize> {
        self.inner.delete_all(owner).await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

pub const ZONE: &str = "zone-example";
pub const TOKEN: &str = "token-example";

/// Registry with example.com, plus example.org when `two_zones` is set
pub fn registry(two_zones: bool) -> Arc<DomainRegistry> {
    let mut domains = vec![DomainConfig::new("example.com", ZONE, TOKEN)];
    if two_zones {
        domains.push(DomainConfig::new("example.org", "zone-org", "token-org"));
    }
    Arc::new(DomainRegistry::new(&domains).expect("valid registry"))
}

pub fn a_record(name: &str, content: &str) -> RecordData {
    RecordData::new(RecordType::A, name, content, "1", true)
}

pub fn desired(name: &str, content: &str) -> DesiredRecord {
    DesiredRecord::new(a_record(name, content), "o")
}

/// Reconciler settings suited to tests: no retries, short timeout
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        call_timeout_secs: 1,
        event_channel_capacity: 100,
        ..ReconcilerConfig::default()
    }
}
