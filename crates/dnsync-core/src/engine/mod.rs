//! Reconciliation engine
//!
//! The Reconciler converges the provider's zones towards the records
//! declared in the store, one pass at a time.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐                      ┌──────────────┐
//! │ RecordStore │── list_desired ─────▶│              │
//! └─────────────┘                      │  Reconciler  │── ReconcileEvent ──▶ events
//!        ▲                             │              │── DriverState ─────▶ watch
//!        │ purge_tombstones            └──────────────┘
//!        │                                    │
//!        └────────────────────────────────────┤
//!                                             ▼
//!                               ┌──────────────────────────┐
//!                               │ DnsProvider              │
//!                               │ (list, create, update,   │
//!                               │  delete)                 │
//!                               └──────────────────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. `Fetching`: read the desired records, then page through every zone.
//!    A failed fetch ends the pass here with nothing applied.
//! 2. `Diffing`: classify each desired record against the snapshot
//! 3. `Applying`: issue the resulting calls concurrently
//! 4. `Cleaning`: purge tombstones from the store
//! 5. Back to `Idle`
//!
//! Passes never overlap: a pass requested while another is running is
//! skipped, not queued.

pub mod apply;
pub mod diff;
pub mod fetch;
pub mod matcher;
pub mod report;
pub mod retry;

pub use apply::{ApplyExecutor, Operation, OperationOutcome};
pub use diff::{Action, Decision, Planned, Warning, classify, diff};
pub use fetch::{fetch_all, fetch_zone};
pub use matcher::find_remote;
pub use report::{DriverState, OperationKind, PassReport, ReconcileEvent};
pub use retry::{RetryPolicy, with_timeout};

use crate::config::{PurgePolicy, ReconcilerConfig};
use crate::error::Result;
use crate::record::DesiredRecord;
use crate::registry::DomainRegistry;
use crate::traits::{DnsProvider, RecordStore};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Reconciliation driver
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Either drive passes yourself with [`Reconciler::try_run_pass()`], or
///    start the periodic loop with [`Reconciler::run()`]
/// 3. The loop runs until a shutdown signal is received, then flushes the
///    store
///
/// ## Threading
///
/// All methods take `&self`; share the reconciler behind an `Arc` to trigger
/// passes from several tasks. Single flight is enforced internally.
pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,

    store: Arc<dyn RecordStore>,

    registry: Arc<DomainRegistry>,

    executor: ApplyExecutor,

    config: ReconcilerConfig,

    /// Held for the whole duration of a pass
    pass_lock: Mutex<()>,

    state_tx: watch::Sender<DriverState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

/// Puts the driver back to `Idle` however the pass ends
struct IdleOnDrop<'a>(&'a watch::Sender<DriverState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(DriverState::Idle);
    }
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// reconciliation events
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        store: Arc<dyn RecordStore>,
        registry: Arc<DomainRegistry>,
        config: ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (state_tx, _) = watch::channel(DriverState::Idle);

        let executor = ApplyExecutor::new(
            Arc::clone(&provider),
            config.max_concurrency,
            config.call_timeout(),
            RetryPolicy::new(config.max_retries, config.retry_backoff()),
        );

        let reconciler = Self {
            provider,
            store,
            registry,
            executor,
            config,
            pass_lock: Mutex::new(()),
            state_tx,
            event_tx,
        };

        Ok((reconciler, event_rx))
    }

    /// Current driver state
    pub fn state(&self) -> DriverState {
        *self.state_tx.borrow()
    }

    /// Watch driver state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<DriverState> {
        self.state_tx.subscribe()
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Run one pass unless one is already in progress
    ///
    /// # Returns
    ///
    /// - `Ok(Some(report))`: the pass completed (individual calls may still
    ///   have failed, see the report)
    /// - `Ok(None)`: another pass was running; nothing was done
    /// - `Err(Error)`: the pass was aborted before applying anything
    pub async fn try_run_pass(&self) -> Result<Option<PassReport>> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            debug!("Reconciliation pass already in progress, skipping");
            self.emit_event(ReconcileEvent::PassSkipped);
            return Ok(None);
        };
        self.pass().await.map(Some)
    }

    /// Run one pass, waiting for any pass in progress to finish first
    pub async fn run_pass(&self) -> Result<PassReport> {
        let _guard = self.pass_lock.lock().await;
        self.pass().await
    }

    /// Run the periodic loop until SIGINT
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the periodic loop until `shutdown_rx` fires (or SIGINT when `None`)
    ///
    /// The loop only stops between passes: a pass in flight always completes.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(ReconcileEvent::Started {
            domains: self.registry.len(),
        });
        info!(
            "Reconciler started: {} domains via {}, every {}s",
            self.registry.len(),
            self.provider.provider_name(),
            self.config.interval_secs
        );

        // First pass one full period after start.
        let period = self.config.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for ctrl-c: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.try_run_pass().await {
                        Ok(Some(report)) => debug!("Pass took {:?}", report.finished_at.map(|t| t - report.started_at)),
                        Ok(None) => {}
                        // Try again next tick.
                        Err(e) => error!("Reconciliation pass failed: {}", e),
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(ReconcileEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        self.store.flush().await?;
        info!("Store flushed, reconciler stopped");

        Ok(())
    }

    async fn pass(&self) -> Result<PassReport> {
        let _idle = IdleOnDrop(&self.state_tx);
        let mut report = PassReport::start();
        let owner = self.config.owner.as_deref();

        self.emit_event(ReconcileEvent::PassStarted);
        self.state_tx.send_replace(DriverState::Fetching);

        let desired = self.store.list_desired(owner).await?;
        let remote = match fetch_all(
            self.provider.as_ref(),
            &self.registry,
            self.config.page_size,
            self.config.call_timeout(),
        )
        .await
        {
            Ok(remote) => remote,
            Err(e) => {
                error!("Failed to fetch remote records, skipping pass: {}", e);
                self.emit_event(ReconcileEvent::FetchFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        self.state_tx.send_replace(DriverState::Diffing);

        let (managed, unconfigured): (Vec<DesiredRecord>, Vec<DesiredRecord>) = desired
            .into_iter()
            .partition(|record| self.registry.is_configured(record.name()));

        // Tombstones with nothing left to delete remotely
        let mut confirmed = Vec::new();

        for record in &unconfigured {
            if record.to_delete {
                // No zone to delete it from, now or later.
                warn!("Dropping tombstone {}: no configured domain", record.name());
                confirmed.push(record.name().to_string());
            } else {
                warn!("Skipping {}: no configured domain", record.name());
            }
        }

        report.desired = managed.len() + unconfigured.len();
        report.remote = remote.len();
        report.skipped_unconfigured = unconfigured.len();
        let mut operations = Vec::new();

        for planned in diff(&managed, &remote) {
            let name = planned.desired.name();
            match (planned.decision.warning, planned.decision.action) {
                (Some(Warning::Drift), Action::Delete(remote)) => {
                    report.drift_warnings += 1;
                    self.emit_event(ReconcileEvent::DriftDetected {
                        name: name.to_string(),
                        record_id: remote.id.clone(),
                    });
                }
                (Some(Warning::AbsentOnDelete), _) => {
                    report.absent_warnings += 1;
                    confirmed.push(name.to_string());
                    self.emit_event(ReconcileEvent::AbsentOnDelete {
                        name: name.to_string(),
                    });
                }
                _ => {}
            }

            match Operation::plan(&self.registry, planned.desired, planned.decision.action) {
                Ok(Some(operation)) => operations.push(operation),
                Ok(None) if !planned.desired.to_delete => report.unchanged += 1,
                Ok(None) => {}
                Err(e) => {
                    error!("Cannot address {}: {}", name, e);
                    report.failed += 1;
                }
            }
        }

        self.state_tx.send_replace(DriverState::Applying);
        if !operations.is_empty() {
            info!("Applying {} changes", operations.len());
        }

        for outcome in self.executor.execute(operations).await {
            match outcome.result {
                Ok(()) => {
                    report.record_success(outcome.kind);
                    if outcome.kind == OperationKind::Delete {
                        confirmed.push(outcome.name.clone());
                    }
                    self.emit_event(ReconcileEvent::OperationSucceeded {
                        name: outcome.name,
                        kind: outcome.kind,
                    });
                }
                Err(e) => {
                    report.failed += 1;
                    self.emit_event(ReconcileEvent::OperationFailed {
                        name: outcome.name,
                        kind: outcome.kind,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.state_tx.send_replace(DriverState::Cleaning);

        let purged = match self.config.purge_policy {
            PurgePolicy::Always => self.store.purge_tombstones(owner).await,
            PurgePolicy::OnSuccess => self.store.purge_tombstones_named(&confirmed).await,
        };
        match purged {
            Ok(count) => {
                report.purged = count;
                if count > 0 {
                    info!("Purged {} tombstoned records", count);
                    self.emit_event(ReconcileEvent::TombstonesPurged { count });
                }
            }
            // Tombstones survive until the next pass.
            Err(e) => error!("Failed to purge tombstoned records: {}", e),
        }

        let report = report.finish();
        info!("Reconciliation pass finished: {}", report);
        self.emit_event(ReconcileEvent::PassFinished {
            report: report.clone(),
        });

        Ok(report)
    }

    /// Emit a reconciliation event
    fn emit_event(&self, event: ReconcileEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if let Err(TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }
}
