// # Record Catalog
//
// In-memory record set shared by the store implementations. Holds the
// store semantics (upsert, soft delete, purge, owner filtering) so that the
// memory and file stores only differ in where the catalog lives.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::Error;
use crate::record::DesiredRecord;
use crate::registry::DomainRegistry;

/// Boundary check for record names entering a store
///
/// Names must end with a configured domain unless unconfigured domains are
/// explicitly accepted.
#[derive(Debug, Clone)]
pub struct NameValidator {
    registry: Arc<DomainRegistry>,
    accept_unconfigured: bool,
}

impl NameValidator {
    pub fn new(registry: Arc<DomainRegistry>, accept_unconfigured: bool) -> Self {
        Self {
            registry,
            accept_unconfigured,
        }
    }

    /// Accept every name
    pub fn permissive() -> Self {
        Self::new(Arc::new(DomainRegistry::default()), true)
    }

    pub fn check(&self, name: &str) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::invalid_input("Record name cannot be empty"));
        }
        if self.accept_unconfigured {
            return Ok(());
        }
        self.registry.resolve(name).map(|_| ())
    }

    pub fn check_all<'a>(
        &self,
        mut names: impl Iterator<Item = &'a str>,
    ) -> Result<(), Error> {
        names.try_for_each(|name| self.check(name))
    }
}

fn owned_by(record: &DesiredRecord, owner: Option<&str>) -> bool {
    owner.is_none_or(|owner| record.owner == owner)
}

/// Records keyed by name
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordCatalog {
    records: BTreeMap<String, DesiredRecord>,
}

impl RecordCatalog {
    /// Build a catalog, later records replacing earlier ones with the same name
    pub(crate) fn from_records(records: impl IntoIterator<Item = DesiredRecord>) -> Self {
        let mut catalog = Self::default();
        for record in records {
            if let Some(previous) = catalog.records.insert(record.data.name.clone(), record) {
                tracing::warn!("Duplicate record name in store: {}", previous.data.name);
            }
        }
        catalog
    }

    pub(crate) fn to_records(&self) -> Vec<DesiredRecord> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn list(&self, owner: Option<&str>) -> Vec<DesiredRecord> {
        self.records
            .values()
            .filter(|record| owned_by(record, owner))
            .cloned()
            .collect()
    }

    pub(crate) fn get(&self, name: &str) -> Option<DesiredRecord> {
        self.records.get(name).cloned()
    }

    /// Insert or replace by name; the stored record is always live
    pub(crate) fn upsert(&mut self, mut record: DesiredRecord) -> DesiredRecord {
        record.to_delete = false;
        self.records.insert(record.data.name.clone(), record.clone());
        record
    }

    pub(crate) fn soft_delete(&mut self, name: &str) -> Result<(), Error> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("No record found for name: \"{}\"", name)))?;
        record.to_delete = true;
        Ok(())
    }

    pub(crate) fn soft_delete_all(&mut self, owner: Option<&str>) -> usize {
        let mut flagged = 0;
        for record in self.records.values_mut().filter(|r| owned_by(r, owner)) {
            record.to_delete = true;
            flagged += 1;
        }
        flagged
    }

    pub(crate) fn delete(&mut self, name: &str) -> Result<(), Error> {
        self.records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("No record found for name: \"{}\"", name)))
    }

    pub(crate) fn delete_all(&mut self, owner: Option<&str>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !owned_by(record, owner));
        before - self.records.len()
    }

    pub(crate) fn purge_tombstones(&mut self, owner: Option<&str>) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| !(record.to_delete && owned_by(record, owner)));
        before - self.records.len()
    }

    pub(crate) fn purge_tombstones_named(&mut self, names: &[String]) -> usize {
        let mut purged = 0;
        for name in names {
            if self.records.get(name).is_some_and(|record| record.to_delete) {
                self.records.remove(name);
                purged += 1;
            }
        }
        purged
    }
}
