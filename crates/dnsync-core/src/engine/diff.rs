//! Differ
//!
//! Classifies every desired record against the remote snapshot:
//!
//! | to_delete | remote found | equivalent | action | warning          |
//! |-----------|--------------|------------|--------|------------------|
//! | true      | no           | n/a        | none   | absent on delete |
//! | true      | yes          | no         | delete | drift            |
//! | true      | yes          | yes        | delete |                  |
//! | false     | no           | n/a        | create |                  |
//! | false     | yes          | yes        | none   |                  |
//! | false     | yes          | no         | update |                  |
//!
//! Remote records with no desired counterpart never appear in the output.

use super::matcher::find_remote;
use crate::record::{DesiredRecord, RemoteRecord, is_equivalent};
use tracing::{debug, warn};

/// What to do with one desired record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    None,
    Create,
    /// Overwrite the matched remote record with the desired fields
    Update(&'a RemoteRecord),
    /// Remove the matched remote record
    Delete(&'a RemoteRecord),
}

/// Non-fatal findings reported alongside an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// Tombstoned, but nothing to delete remotely
    AbsentOnDelete,
    /// Tombstoned, and the remote record no longer matches what was declared
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision<'a> {
    pub action: Action<'a>,
    pub warning: Option<Warning>,
}

impl<'a> Decision<'a> {
    fn new(action: Action<'a>) -> Self {
        Self {
            action,
            warning: None,
        }
    }

    fn warn(action: Action<'a>, warning: Warning) -> Self {
        Self {
            action,
            warning: Some(warning),
        }
    }
}

/// A desired record with its classification
#[derive(Debug, Clone, Copy)]
pub struct Planned<'a> {
    pub desired: &'a DesiredRecord,
    pub decision: Decision<'a>,
}

/// Classify one desired record against its remote match, if any
pub fn classify<'a>(desired: &DesiredRecord, remote: Option<&'a RemoteRecord>) -> Decision<'a> {
    match (desired.to_delete, remote) {
        (true, None) => Decision::warn(Action::None, Warning::AbsentOnDelete),
        (true, Some(r)) if is_equivalent(&desired.data, &r.data) => {
            Decision::new(Action::Delete(r))
        }
        (true, Some(r)) => Decision::warn(Action::Delete(r), Warning::Drift),
        (false, None) => Decision::new(Action::Create),
        (false, Some(r)) if is_equivalent(&desired.data, &r.data) => Decision::new(Action::None),
        (false, Some(r)) => Decision::new(Action::Update(r)),
    }
}

/// Classify every desired record against the remote snapshot
pub fn diff<'a>(desired: &'a [DesiredRecord], remote: &'a [RemoteRecord]) -> Vec<Planned<'a>> {
    desired
        .iter()
        .map(|record| {
            let decision = classify(record, find_remote(record.name(), remote));
            log_decision(record, &decision);
            Planned {
                desired: record,
                decision,
            }
        })
        .collect()
}

fn log_decision(record: &DesiredRecord, decision: &Decision<'_>) {
    match (decision.warning, decision.action) {
        (Some(Warning::AbsentOnDelete), _) => {
            warn!(
                "Record {} is marked for deletion but absent remotely",
                record.name()
            );
        }
        (Some(Warning::Drift), Action::Delete(remote)) => {
            warn!(
                "Record {} ({}) was manually changed remotely: declared {} {}, found {} {}; deleting anyway",
                record.name(),
                remote.id,
                record.data.record_type,
                record.data.content,
                remote.data.record_type,
                remote.data.content
            );
        }
        (_, Action::None) => debug!("Record {} is up to date", record.name()),
        (_, Action::Create) => debug!("Record {} will be created", record.name()),
        (_, Action::Update(remote)) => {
            debug!("Record {} ({}) will be updated", record.name(), remote.id)
        }
        (_, Action::Delete(remote)) => {
            debug!("Record {} ({}) will be deleted", record.name(), remote.id)
        }
    }
}
