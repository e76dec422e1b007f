//! Contract Test: Remote Fetch & Pagination
//!
//! Constraints verified:
//! - Pagination stops on the first page shorter than the page size
//! - Every configured zone is fetched, results are concatenated
//! - A failed page fails the whole snapshot: the pass applies and purges nothing
//!
//! If this test fails, passes may act on a partial view of the provider.

mod common;

use common::*;
use dnsync_core::Error;
use dnsync_core::engine::{DriverState, ReconcileEvent, Reconciler, fetch_all};
use dnsync_core::state::MemoryRecordStore;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);

fn list_pages(provider: &StubProvider) -> Vec<u32> {
    provider
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::List { page, per_page, .. } => {
                assert_eq!(per_page, 100);
                Some(page)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn short_last_page_ends_pagination() {
    let provider = StubProvider::new();
    provider.fill(ZONE, "example.com", 237);

    let records = fetch_all(&provider, &registry(false), 100, TIMEOUT)
        .await
        .unwrap();

    assert_eq!(provider.list_call_count(), 3);
    assert_eq!(list_pages(&provider), vec![1, 2, 3]);
    assert_eq!(records.len(), 237);
}

#[tokio::test]
async fn empty_page_after_full_page_ends_pagination() {
    let provider = StubProvider::new();
    provider.fill(ZONE, "example.com", 100);

    let records = fetch_all(&provider, &registry(false), 100, TIMEOUT)
        .await
        .unwrap();

    assert_eq!(provider.list_call_count(), 2);
    assert_eq!(records.len(), 100);
}

#[tokio::test]
async fn all_zones_are_fetched() {
    let provider = StubProvider::new();
    provider.fill(ZONE, "example.com", 3);
    provider.fill("zone-org", "example.org", 120);

    let records = fetch_all(&provider, &registry(true), 100, TIMEOUT)
        .await
        .unwrap();

    assert_eq!(records.len(), 123);
    assert_eq!(provider.list_call_count(), 3);
    assert!(
        records
            .iter()
            .filter(|r| r.domain == "example.org")
            .all(|r| r.zone_id == "zone-org")
    );
}

#[tokio::test]
async fn failing_zone_fails_the_snapshot() {
    let provider = StubProvider::new();
    provider.fill(ZONE, "example.com", 3);
    provider.fail_listing("zone-org");

    let result = fetch_all(&provider, &registry(true), 100, TIMEOUT).await;

    match result {
        Err(Error::Fetch { domain, source }) => {
            assert_eq!(domain, "example.org");
            assert!(matches!(*source, Error::Transport(_)));
        }
        other => panic!("expected fetch failure, got {:?}", other),
    }
}

#[tokio::test]
async fn fetch_failure_aborts_the_pass() {
    let provider = Arc::new(StubProvider::new());
    provider.fail_listing("zone-org");
    let store = Arc::new(CountingStore::new(MemoryRecordStore::with_records([
        desired("a.example.com", "1.2.3.4"),
        desired("b.example.com", "1.2.3.4").tombstoned(),
    ])));

    let (reconciler, mut events) =
        Reconciler::new(provider.clone(), store.clone(), registry(true), test_config())
            .expect("reconciler construction succeeds");

    let result = reconciler.try_run_pass().await;

    assert!(matches!(result, Err(Error::Fetch { .. })));
    assert_eq!(provider.mutation_call_count(), 0);
    assert_eq!(store.purge_call_count(), 0, "no cleanup after a failed fetch");
    assert_eq!(reconciler.state(), DriverState::Idle);

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ReconcileEvent::FetchFailed { .. }) {
            failed = true;
        }
        assert!(!matches!(event, ReconcileEvent::PassFinished { .. }));
    }
    assert!(failed);
}
