// # File Record Store
//
// JSON file implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// Keeps the declared record set across daemon restarts. The file is the
// source of truth: it is re-read on every operation, so records edited
// by hand (or by another process) are picked up by the next pass.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good file
// - Recovery: Falls back to backup if corruption detected when the store is
//   opened. Once open, an unreadable file fails the operation and is left
//   untouched until it is fixed.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "updated_at": "2025-01-09T12:00:00Z",
//   "records": [
//     {
//       "type": "A",
//       "name": "www.example.com",
//       "content": "1.2.3.4",
//       "ttl": "1",
//       "proxied": true,
//       "owner": "web",
//       "to_delete": false
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::catalog::{NameValidator, RecordCatalog};
use crate::Error;
use crate::record::DesiredRecord;
use crate::traits::record_store::RecordStore;

/// Store file format version
/// Used for future migration if format changes
const STORE_FILE_VERSION: &str = "1.0";

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    records: Vec<DesiredRecord>,
}

/// File-based record store with crash recovery
///
/// Operations are serialized through one lock; each one reads the file,
/// applies its change and, if something changed, writes the file back
/// atomically.
///
/// # Example
///
/// ```rust,no_run
/// use dnsync_core::state::{FileRecordStore, NameValidator};
/// use dnsync_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/dnsync/records.json", NameValidator::permissive()).await?;
///
///     store.soft_delete("old.example.com").await?;
///     let tombstones = store
///         .list_desired(None)
///         .await?
///         .into_iter()
///         .filter(|r| r.to_delete)
///         .count();
///     println!("{} record(s) pending remote deletion", tombstones);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
    validator: NameValidator,
}

impl FileRecordStore {
    /// Open (or prepare) a store file
    ///
    /// Creates parent directories if needed and loads the file once, so an
    /// unreadable store fails at startup rather than on the first pass.
    pub async fn new<P: AsRef<Path>>(path: P, validator: NameValidator) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let catalog = Self::load_with_recovery(&path).await?;
        tracing::debug!(
            "Opened record store {} ({} records)",
            path.display(),
            catalog.len()
        );

        Ok(Self {
            path,
            lock: Mutex::new(()),
            validator,
        })
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main store file
    /// 2. If JSON parse error, try loading backup (and restore it)
    /// 3. If backup also fails, start with empty catalog
    async fn load_with_recovery(path: &Path) -> Result<RecordCatalog, Error> {
        match Self::load(path).await {
            Ok(catalog) => Ok(catalog),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Store file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(RecordCatalog::default());
                }

                match Self::load(&backup_path).await {
                    Ok(catalog) => {
                        tracing::info!("Recovered store from backup: {} records", catalog.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(catalog)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(RecordCatalog::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the catalog from `path`; a missing file is an empty store
    async fn load(path: &Path) -> Result<RecordCatalog, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(RecordCatalog::default());
        }

        let content = fs::read_to_string(path).await?;
        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(RecordCatalog::from_records(file.records))
    }

    /// Write the catalog atomically, keeping the previous file as backup
    async fn write(&self, catalog: &RecordCatalog) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            updated_at: Some(Utc::now()),
            records: catalog.to_records(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.flush().await?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Load the catalog of an open store
    async fn load_current(&self) -> Result<RecordCatalog, Error> {
        Self::load(&self.path).await.map_err(|e| match e {
            Error::Json(e) => Error::store(format!(
                "Store file {} is unreadable, not touching it: {}",
                self.path.display(),
                e
            )),
            other => other,
        })
    }

    async fn read<T>(&self, f: impl FnOnce(&RecordCatalog) -> T + Send) -> Result<T, Error> {
        let _guard = self.lock.lock().await;
        let catalog = self.load_current().await?;
        Ok(f(&catalog))
    }

    /// Load, apply `f`, and write back when `f` reports a change
    async fn modify<T: Send>(
        &self,
        f: impl FnOnce(&mut RecordCatalog) -> Result<(T, bool), Error> + Send,
    ) -> Result<T, Error> {
        let _guard = self.lock.lock().await;
        let mut catalog = self.load_current().await?;
        let (value, changed) = f(&mut catalog)?;
        if changed {
            self.write(&catalog).await?;
        }
        Ok(value)
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn list_desired(&self, owner: Option<&str>) -> Result<Vec<DesiredRecord>, Error> {
        self.read(|catalog| catalog.list(owner)).await
    }

    async fn purge_tombstones(&self, owner: Option<&str>) -> Result<usize, Error> {
        self.modify(|catalog| {
            let purged = catalog.purge_tombstones(owner);
            Ok((purged, purged > 0))
        })
        .await
    }

    async fn purge_tombstones_named(&self, names: &[String]) -> Result<usize, Error> {
        self.modify(|catalog| {
            let purged = catalog.purge_tombstones_named(names);
            Ok((purged, purged > 0))
        })
        .await
    }

    async fn get(&self, name: &str) -> Result<Option<DesiredRecord>, Error> {
        self.read(|catalog| catalog.get(name)).await
    }

    async fn upsert(&self, record: DesiredRecord) -> Result<DesiredRecord, Error> {
        self.validator.check(record.name())?;
        self.modify(|catalog| Ok((catalog.upsert(record), true))).await
    }

    async fn upsert_many(&self, records: Vec<DesiredRecord>) -> Result<Vec<DesiredRecord>, Error> {
        self.validator.check_all(records.iter().map(|r| r.name()))?;
        self.modify(|catalog| {
            let stored = records.into_iter().map(|r| catalog.upsert(r)).collect();
            Ok((stored, true))
        })
        .await
    }

    async fn soft_delete(&self, name: &str) -> Result<(), Error> {
        self.modify(|catalog| catalog.soft_delete(name).map(|()| ((), true)))
            .await
    }

    async fn soft_delete_all(&self, owner: Option<&str>) -> Result<usize, Error> {
        self.modify(|catalog| {
            let flagged = catalog.soft_delete_all(owner);
            Ok((flagged, flagged > 0))
        })
        .await
    }

    async fn soft_replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>, Error> {
        self.validator.check_all(records.iter().map(|r| r.name()))?;
        self.modify(|catalog| {
            catalog.soft_delete_all(owner);
            let stored = records.into_iter().map(|r| catalog.upsert(r)).collect();
            Ok((stored, true))
        })
        .await
    }

    async fn replace_all(
        &self,
        records: Vec<DesiredRecord>,
        owner: Option<&str>,
    ) -> Result<Vec<DesiredRecord>, Error> {
        self.validator.check_all(records.iter().map(|r| r.name()))?;
        self.modify(|catalog| {
            catalog.delete_all(owner);
            let stored = records.into_iter().map(|r| catalog.upsert(r)).collect();
            Ok((stored, true))
        })
        .await
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        self.modify(|catalog| catalog.delete(name).map(|()| ((), true)))
            .await
    }

    async fn delete_all(&self, owner: Option<&str>) -> Result<usize, Error> {
        self.modify(|catalog| {
            let deleted = catalog.delete_all(owner);
            Ok((deleted, deleted > 0))
        })
        .await
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every mutation is written through
        Ok(())
    }
}
