// # Record Store Trait
//
// Defines the interface to the persisted desired state.
//
// ## Purpose
//
// The store holds the declared record set. The reconciler reads it once at
// the start of a pass (`list_desired`) and mutates it once at the end
// (`purge_tombstones`). Everything else on this trait is the upstream
// surface through which records get declared, changed and soft-deleted.
//
// ## Implementations
//
// - In-memory: `MemoryRecordStore`
// - JSON file: `FileRecordStore`
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::RecordStore;
//
// store.upsert(record).await?;
// store.soft_delete("old.example.com").await?;
//
// // Next pass deletes old.example.com remotely, then purges it here
// let desired = store.list_desired(None).await?;
// ```

use crate::record::DesiredRecord;
use async_trait::async_trait;

/// Trait for record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. The
/// reconciler does not lock the store; concurrent upserts during a pass are
/// the store's concern.
///
/// # Owner filter
///
/// Methods taking `owner: Option<&str>` act on every record when `None` and
/// only on that owner's records otherwise.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List declared records, tombstones included
    async fn list_desired(&self, owner: Option<&str>) -> Result<Vec<DesiredRecord>, crate::Error>;

    /// Remove every tombstoned record
    ///
    /// # Returns
    ///
    /// The number of records removed
    async fn purge_tombstones(&self, owner: Option<&str>) -> Result<usize, crate::Error>;

    /// Remove the named records, but only those still tombstoned
    ///
    /// A record upserted again since the pass read it is kept.
    async fn purge_tombstones_named(&self, names: &[String]) -> Result<usize, crate::Error>;

    /// Get a record by name
    async fn get(&self, name: &str) -> Result<Option<DesiredRecord>, crate::Error>;

    /// Insert or replace the record with the same name
    ///
    /// The stored record is live (`to_delete = false`) whatever the input
    /// says. Fails with `UnconfiguredDomain` when the name matches no
    /// configured domain, unless the store accepts unconfigured domains.
    async fn upsert(&self, record: DesiredRecord) -> Result<DesiredRecord, crate::Error>;

    /// Upsert several records; nothing is written if any name is rejected
    async fn upsert_many(
        &self,
        records: Vec<DesiredRecord>,
    ) -> Result<Vec<DesiredRecord>, crate::Error>;

    /// Flag a record for deletion
    ///
    /// Fails with `NotFound` when no record has this name.
    async fn soft_delete(&self, name: &str) -> Result<(), crate::Error>;

    /// Flag every record (of `owner`) for deletion
    async fn soft_delete_all(&self, owner: Option<&str>) -> Result<usize, crate::Error>;

    /// Declare the complete record set (of `owner`)
    ///
    /// Every existing record is flagged for deletion, then `records` are
    /// upserted, so records absent from `records` get removed remotely by
    /// the next pass.
    async fn soft_replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>, crate::Error>;

    /// Like `soft_replace_all`, but drops the old records outright
    ///
    /// Dropped records are forgotten locally and left untouched remotely.
    async fn replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>, crate::Error>;

    /// Remove a record without touching the provider
    async fn delete(&self, name: &str) -> Result<(), crate::Error>;

    /// Remove every record (of `owner`) without touching the provider
    async fn delete_all(&self, owner: Option<&str>) -> Result<usize, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
