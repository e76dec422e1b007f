//! Contract Test: Idempotency
//!
//! Constraints verified:
//! - A desired set already equivalent to the remote set causes zero mutations
//! - A second pass after a converging pass causes zero mutations
//! - Owner, provider id and tombstone flag never make records differ
//!
//! If this test fails, reconciliation would hammer the provider every pass.

mod common;

use common::*;
use dnsync_core::engine::Reconciler;
use dnsync_core::record::{DesiredRecord, RecordData, RecordType};
use dnsync_core::state::MemoryRecordStore;
use std::sync::Arc;

#[tokio::test]
async fn equivalent_sets_issue_no_mutations() {
    let provider = Arc::new(StubProvider::new());
    let records = [
        a_record("a.example.com", "1.2.3.4"),
        RecordData::new(RecordType::Aaaa, "b.example.com", "2001:db8::1", "300", false),
        RecordData::new(RecordType::Cname, "c.example.com", "a.example.com", "1", true),
    ];
    for (n, data) in records.iter().enumerate() {
        provider.insert_data(ZONE, &format!("R{}", n), data);
    }
    let store = Arc::new(MemoryRecordStore::with_records(
        records
            .iter()
            .enumerate()
            .map(|(n, data)| DesiredRecord::new(data.clone(), format!("owner-{}", n))),
    ));

    let (reconciler, _events) =
        Reconciler::new(provider.clone(), store.clone(), registry(false), test_config())
            .expect("reconciler construction succeeds");

    let report = reconciler.run_pass().await.unwrap();

    assert_eq!(
        provider.mutation_call_count(),
        0,
        "Expected no provider mutations, got {:?}",
        provider.mutations()
    );
    assert_eq!(report.unchanged, 3);
    assert_eq!(report.operations(), 0);
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let provider = Arc::new(StubProvider::new());
    provider.insert_data(ZONE, "R1", &a_record("b.example.com", "1.1.1.1"));
    provider.insert_data(ZONE, "R2", &a_record("c.example.com", "1.1.1.1"));
    let store = Arc::new(MemoryRecordStore::with_records([
        desired("a.example.com", "1.2.3.4"),
        desired("b.example.com", "2.2.2.2"),
        desired("c.example.com", "1.1.1.1").tombstoned(),
    ]));

    let (reconciler, _events) =
        Reconciler::new(provider.clone(), store.clone(), registry(false), test_config())
            .expect("reconciler construction succeeds");

    let first = reconciler.run_pass().await.unwrap();
    assert_eq!(first.operations(), 3);

    let second = reconciler.run_pass().await.unwrap();
    assert_eq!(second.operations(), 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(provider.mutation_call_count(), 3);
}
