//! Batch source scans

mod helpers;

use helpers::*;
use leadroute_core::channels::ChannelKind;
use leadroute_core::ingest::{IngestSummary, LeadIntake, SourceProcessor};
use leadroute_core::store::LeadStore;
use std::time::Duration;

#[tokio::test]
async fn test_scan_ingests_valid_rows_and_marks_them() {
    let (_dir, pool) = test_db().await;
    let sheet = MockChannel::ok(ChannelKind::Sheet);
    let router = build_router(&pool, vec![as_channel(&sheet)], None).await;
    add_client(router.directory(), sheet_and_crm_client("[X1] Acme")).await;

    let mut processed = source_row("2024-01-01 09:00:00", "L0", PHONE, "B1_[X1] Acme_new");
    processed.extend(["", "", "", "✅"].iter().map(|c| c.to_string()));

    let source = MockSource::new(vec![
        processed,
        source_row("2024-01-01 10:00:00", "L1", "+7 (900) 123-45-67", "B2_[X1] Acme_new"),
        source_row("2024-01-01 11:00:00", "L2", "12345", "B2_[X1] Acme_new"),
        source_row("not a date", "L3", PHONE, "B2_[X1] Acme_new"),
        source_row("2024-01-01 12:00:00", "L4", PHONE, "Unknown"),
        source_row("2024-01-01 10:00:00", "L1", PHONE, "B2_[X1] Acme_new"),
    ]);

    let store = LeadStore::new(pool.clone());
    let processor = SourceProcessor::new(source.clone(), LeadIntake::new(store.clone(), router), Duration::ZERO);
    let summary = processor.process(false).await.unwrap();

    assert_eq!(
        summary,
        IngestSummary {
            rows: 5,
            inserted: 2,
            duplicates: 1,
            invalid: 2,
            sent: 1,
            undelivered: 0,
            unresolved: 1,
            store_errors: 0,
            mark_failures: 0,
        }
    );
    assert_eq!(source.marked(), vec![3, 6, 7]);
    assert_eq!(sheet.calls(), 1);

    let lead = store.get("L1").await.unwrap().unwrap();
    assert_eq!(lead.phone, PHONE);
    assert_eq!(lead.tag, "[X1] Acme");
    assert_eq!(lead.original_tag.as_deref(), Some("B2_[X1] Acme_new"));
    assert!(!store.exists("L0").await.unwrap());
    assert!(!store.exists("L2").await.unwrap());
    assert!(!store.exists("L3").await.unwrap());

    let rescan = processor.process(false).await.unwrap();
    assert_eq!(rescan.rows, 2);
    assert_eq!(rescan.invalid, 2);
    assert_eq!(rescan.inserted, 0);
}

#[tokio::test]
async fn test_forced_scan_revisits_processed_rows() {
    let (_dir, pool) = test_db().await;
    let router = build_router(&pool, Vec::new(), None).await;

    let mut processed = source_row("2024-01-01 09:00:00", "L0", PHONE, "Acme");
    processed.extend(["", "", "", "✅"].iter().map(|c| c.to_string()));
    let source = MockSource::new(vec![processed]);

    let store = LeadStore::new(pool.clone());
    let processor = SourceProcessor::new(source.clone(), LeadIntake::new(store.clone(), router), Duration::ZERO);

    assert_eq!(processor.process(false).await.unwrap().rows, 0);

    let forced = processor.process(true).await.unwrap();
    assert_eq!(forced.rows, 1);
    assert_eq!(forced.inserted, 1);
    assert_eq!(forced.unresolved, 1);
    assert!(store.exists("L0").await.unwrap());
    // Already carries the marker, so it is not written again.
    assert!(source.marked().is_empty());
}
