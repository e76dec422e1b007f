// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for embedding the reconciler in a process that
// owns the declared records itself.
//
// ## Crash Behavior
//
// - All declared records are lost on restart
// - Remote records are left as they are: reconciliation never deletes
//   records it has no tombstone for

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::catalog::{NameValidator, RecordCatalog};
use crate::Error;
use crate::record::DesiredRecord;
use crate::traits::record_store::RecordStore;

/// In-memory record store implementation
///
/// # Example
///
/// ```rust,no_run
/// use dnsync_core::record::{DesiredRecord, RecordData, RecordType};
/// use dnsync_core::state::MemoryRecordStore;
/// use dnsync_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     let data = RecordData::new(RecordType::A, "www.example.com", "1.2.3.4", "1", true);
///     store.upsert(DesiredRecord::new(data, "web")).await?;
///     store.soft_delete("www.example.com").await?;
///
///     let desired = store.list_desired(None).await?;
///     assert!(desired[0].to_delete);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<RecordCatalog>>,
    validator: NameValidator,
}

impl MemoryRecordStore {
    /// Create an empty store accepting any record name
    pub fn new() -> Self {
        Self::with_validator(NameValidator::permissive())
    }

    /// Create an empty store that checks names with `validator`
    pub fn with_validator(validator: NameValidator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RecordCatalog::default())),
            validator,
        }
    }

    /// Create a store holding `records` exactly as given, tombstones included
    pub fn with_records(records: impl IntoIterator<Item = DesiredRecord>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RecordCatalog::from_records(records))),
            validator: NameValidator::permissive(),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.len() == 0
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_desired(&self, owner: Option<&str>) -> Result<Vec<DesiredRecord>, Error> {
        Ok(self.inner.read().await.list(owner))
    }

    async fn purge_tombstones(&self, owner: Option<&str>) -> Result<usize, Error> {
        Ok(self.inner.write().await.purge_tombstones(owner))
    }

    async fn purge_tombstones_named(&self, names: &[String]) -> Result<usize, Error> {
        Ok(self.inner.write().await.purge_tombstones_named(names))
    }

    async fn get(&self, name: &str) -> Result<Option<DesiredRecord>, Error> {
        Ok(self.inner.read().await.get(name))
    }

    async fn upsert(&self, record: DesiredRecord) -> Result<DesiredRecord, Error> {
        self.validator.check(record.name())?;
        Ok(self.inner.write().await.upsert(record))
    }

    async fn upsert_many(&self, records: Vec<DesiredRecord>) -> Result<Vec<DesiredRecord>, Error> {
        self.validator.check_all(records.iter().map(|r| r.name()))?;
        let mut guard = self.inner.write().await;
        Ok(records.into_iter().map(|r| guard.upsert(r)).collect())
    }

    async fn soft_delete(&self, name: &str) -> Result<(), Error> {
        self.inner.write().await.soft_delete(name)
    }

    async fn soft_delete_all(&self, owner: Option<&str>) -> Result<usize, Error> {
        Ok(self.inner.write().await.soft_delete_all(owner))
    }

    async fn soft_replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>, Error> {
        self.validator.check_all(records.iter().map(|r| r.name()))?;
        let mut guard = self.inner.write().await;
        guard.soft_delete_all(owner);
        Ok(records.into_iter().map(|r| guard.upsert(r)).collect())
    }

    async fn replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>, Error> {
        self.validator.check_all(records.iter().map(|r| r.name()))?;
        let mut guard = self.inner.write().await;
        guard.delete_all(owner);
        Ok(records.into_iter().map(|r| guard.upsert(r)).collect())
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        self.inner.write().await.delete(name)
    }

    async fn delete_all(&self, owner: Option<&str>) -> Result<usize, Error> {
        Ok(self.inner.write().await.delete_all(owner))
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}
