//! Observability types for the reconciler
//!
//! - [`DriverState`]: where the driver is in its pass cycle
//! - [`ReconcileEvent`]: what happened, emitted on a bounded channel
//! - [`PassReport`]: summary returned by every completed pass

use chrono::{DateTime, Utc};
use std::fmt;

/// Reconciler pass cycle
///
/// `Idle → Fetching → Diffing → Applying → Cleaning → Idle`. A failed fetch
/// goes straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DriverState {
    #[default]
    Idle,
    Fetching,
    Diffing,
    Applying,
    Cleaning,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Idle => "idle",
            DriverState::Fetching => "fetching",
            DriverState::Diffing => "diffing",
            DriverState::Applying => "applying",
            DriverState::Cleaning => "cleaning",
        };
        f.write_str(name)
    }
}

/// Remote operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Periodic loop started
    Started { domains: usize },

    /// A pass began fetching
    PassStarted,

    /// A pass was requested while another one was running
    PassSkipped,

    /// The remote snapshot could not be fetched; nothing was applied
    FetchFailed { error: String },

    /// A tombstoned record differs remotely from what was declared
    DriftDetected { name: String, record_id: String },

    /// A tombstoned record does not exist remotely
    AbsentOnDelete { name: String },

    /// A remote call succeeded
    OperationSucceeded { name: String, kind: OperationKind },

    /// A remote call failed and was abandoned for this pass
    OperationFailed {
        name: String,
        kind: OperationKind,
        error: String,
    },

    /// Tombstones removed from the store after applying
    TombstonesPurged { count: usize },

    /// A pass completed
    PassFinished { report: PassReport },

    /// Periodic loop stopped
    Stopped { reason: String },
}

/// Summary of one completed pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Desired records read from the store (after owner filtering)
    pub desired: usize,
    /// Remote records of managed types across all zones
    pub remote: usize,
    /// Desired records skipped because their name matches no domain
    pub skipped_unconfigured: usize,
    pub unchanged: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Remote calls that failed (after retries)
    pub failed: usize,
    pub drift_warnings: usize,
    pub absent_warnings: usize,
    pub purged: usize,
}

impl PassReport {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            desired: 0,
            remote: 0,
            skipped_unconfigured: 0,
            unchanged: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            failed: 0,
            drift_warnings: 0,
            absent_warnings: 0,
            purged: 0,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Remote mutations attempted in this pass
    pub fn operations(&self) -> usize {
        self.created + self.updated + self.deleted + self.failed
    }

    pub(crate) fn record_success(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::Create => self.created += 1,
            OperationKind::Update => self.updated += 1,
            OperationKind::Delete => self.deleted += 1,
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} desired / {} remote: {} created, {} updated, {} deleted, {} unchanged, {} failed, {} purged",
            self.desired,
            self.remote,
            self.created,
            self.updated,
            self.deleted,
            self.unchanged,
            self.failed,
            self.purged
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_count_failures() {
        let mut report = PassReport::start();
        report.record_success(OperationKind::Create);
        report.record_success(OperationKind::Delete);
        report.failed = 1;
        assert_eq!(report.operations(), 3);
        assert!(report.clone().finish().finished_at.is_some());
    }
}
