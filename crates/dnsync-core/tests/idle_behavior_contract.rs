//! Contract Test: Idle Behavior
//!
//! This test verifies that the periodic loop only reads when nothing changes.
//!
//! Constraints verified:
//! - A converged zone sees list calls only, pass after pass
//! - No mutations happen between ticks
//! - Events report every pass, with nothing applied
//!
//! If this test fails, someone has added:
//! - Writes that do not come from a diff
//! - Background tasks outside the pass cycle

mod common;

use common::*;
use dnsync_core::engine::{ReconcileEvent, Reconciler};
use dnsync_core::state::MemoryRecordStore;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn converged_zone_is_only_read() {
    let provider = Arc::new(StubProvider::new());
    provider.insert_data(ZONE, "R1", &a_record("a.example.com", "1.2.3.4"));
    provider.insert_data(ZONE, "R2", &a_record("unmanaged.example.com", "4.3.2.1"));
    let store = Arc::new(MemoryRecordStore::with_records([desired(
        "a.example.com",
        "1.2.3.4",
    )]));

    let (reconciler, mut events) =
        Reconciler::new(provider.clone(), store.clone(), registry(false), test_config())
            .expect("reconciler construction succeeds");
    let interval = Duration::from_secs(test_config().interval_secs);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { reconciler.run_with_shutdown(Some(shutdown_rx)).await });

    // Three ticks, then stop halfway to the fourth.
    tokio::time::sleep(interval * 3 + interval / 2).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(provider.list_call_count(), 3);
    assert_eq!(provider.mutation_call_count(), 0);

    let mut finished = 0;
    while let Ok(event) = events.try_recv() {
        if let ReconcileEvent::PassFinished { report } = event {
            assert_eq!(report.operations(), 0);
            assert_eq!(report.unchanged, 1);
            finished += 1;
        }
    }
    assert_eq!(finished, 3);
}

#[tokio::test]
async fn empty_store_issues_no_mutations() {
    let provider = Arc::new(StubProvider::new());
    provider.fill(ZONE, "example.com", 12);
    let store = Arc::new(MemoryRecordStore::new());

    let (reconciler, _events) =
        Reconciler::new(provider.clone(), store.clone(), registry(false), test_config())
            .expect("reconciler construction succeeds");

    let report = reconciler.run_pass().await.unwrap();

    assert_eq!(report.remote, 12);
    assert_eq!(provider.mutation_call_count(), 0);
    assert_eq!(provider.records(ZONE).len(), 12);
}
