//! Apply executor
//!
//! Turns classified actions into provider calls and issues them
//! concurrently, with at most `max_concurrency` calls in flight. Every call
//! resolves on its own: a failure is logged and reported in its
//! [`OperationOutcome`], and never cancels or delays any other call.

use super::diff::Action;
use super::report::OperationKind;
use super::retry::{RetryPolicy, with_timeout};
use crate::error::{Error, Result};
use crate::record::{DesiredRecord, RecordData, RemoteRecord};
use crate::registry::{DomainRegistry, Zone};
use crate::traits::DnsProvider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// One remote mutation, fully addressed
#[derive(Debug, Clone)]
pub enum Operation {
    /// POST the desired fields to the zone owning the name
    Create { zone: Zone, record: RecordData },
    /// PUT the desired fields to the matched remote record
    Update {
        zone: Zone,
        record_id: String,
        record: RecordData,
    },
    /// DELETE the matched remote record, addressed by where it was listed
    Delete {
        zone: Zone,
        record_id: String,
        name: String,
    },
}

impl Operation {
    /// Build the operation for a classified action
    ///
    /// Returns `Ok(None)` for [`Action::None`]. Creates resolve their zone
    /// from the desired name; updates and deletes target the zone the remote
    /// record was listed from.
    pub fn plan(
        registry: &DomainRegistry,
        desired: &DesiredRecord,
        action: Action<'_>,
    ) -> Result<Option<Self>> {
        let operation = match action {
            Action::None => return Ok(None),
            Action::Create => Operation::Create {
                zone: registry.resolve(desired.name())?.clone(),
                record: desired.data.clone(),
            },
            Action::Update(remote) => Operation::Update {
                zone: remote_zone(registry, remote)?,
                record_id: remote.id.clone(),
                record: desired.data.clone(),
            },
            Action::Delete(remote) => Operation::Delete {
                zone: remote_zone(registry, remote)?,
                record_id: remote.id.clone(),
                name: remote.name().to_string(),
            },
        };
        Ok(Some(operation))
    }

    pub fn name(&self) -> &str {
        match self {
            Operation::Create { record, .. } | Operation::Update { record, .. } => &record.name,
            Operation::Delete { name, .. } => name,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Issue the single provider call for this operation
    pub async fn dispatch(&self, provider: &dyn DnsProvider) -> Result<()> {
        match self {
            Operation::Create { zone, record } => provider.create_record(zone, record).await,
            Operation::Update {
                zone,
                record_id,
                record,
            } => provider.update_record(zone, record_id, record).await,
            Operation::Delete {
                zone, record_id, ..
            } => provider.delete_record(zone, record_id).await,
        }
    }
}

fn remote_zone(registry: &DomainRegistry, remote: &RemoteRecord) -> Result<Zone> {
    let configured = registry.zone(&remote.domain)?;
    Ok(Zone {
        domain: remote.domain.clone(),
        zone_id: remote.zone_id.clone(),
        credential: configured.credential.clone(),
    })
}

/// Result of one operation
#[derive(Debug)]
pub struct OperationOutcome {
    pub name: String,
    pub kind: OperationKind,
    pub result: Result<()>,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Bounded concurrent executor for [`Operation`]s
#[derive(Clone)]
pub struct ApplyExecutor {
    provider: Arc<dyn DnsProvider>,
    max_concurrency: usize,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl ApplyExecutor {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        max_concurrency: usize,
        call_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            max_concurrency: max_concurrency.max(1),
            call_timeout,
            retry,
        }
    }

    /// Issue every operation and wait for all of them
    ///
    /// Returns one outcome per operation, in completion order.
    pub async fn execute(&self, operations: Vec<Operation>) -> Vec<OperationOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();
        let mut pending = HashMap::new();

        for operation in operations {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let call_timeout = self.call_timeout;
            let retry = self.retry;
            let name = operation.name().to_string();
            let kind = operation.kind();
            let pending_name = name.clone();

            let handle = join_set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let label = format!("{} {}", kind, name);
                        retry
                            .run(&label, || {
                                with_timeout(call_timeout, operation.dispatch(provider.as_ref()))
                            })
                            .await
                    }
                    Err(_) => Err(Error::Other("apply executor closed".to_string())),
                };

                log_outcome(&name, kind, &result);
                OperationOutcome { name, kind, result }
            });
            pending.insert(handle.id(), (pending_name, kind));
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    let (name, kind) = pending
                        .remove(&e.id())
                        .unwrap_or_else(|| ("<unknown>".to_string(), OperationKind::Update));
                    error!("{} {} task failed: {}", kind, name, e);
                    outcomes.push(OperationOutcome {
                        name,
                        kind,
                        result: Err(Error::Other(format!("apply task failed: {}", e))),
                    });
                }
            }
        }
        outcomes
    }
}

fn log_outcome(name: &str, kind: OperationKind, result: &Result<()>) {
    match result {
        Ok(()) => info!("{} {} succeeded", kind, name),
        Err(Error::Transport(msg)) => {
            warn!("{} {} abandoned, provider unreachable: {}", kind, name, msg)
        }
        Err(Error::ProviderResponse {
            status,
            body,
            request,
        }) => warn!(
            "{} {} rejected with status {}: {} (request: {})",
            kind,
            name,
            status,
            body,
            request.as_deref().unwrap_or("<none>")
        ),
        Err(e) => warn!("{} {} failed: {}", kind, name, e),
    }
}
