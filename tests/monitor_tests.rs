// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the event monitor
//!
//! Exercises the sync, monitor, and handler loops end to end against mock
//! sources, including their RUNNING/STOPPING/DEAD/CRASH reporting.

mod helpers;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_primitives::Address;
use async_trait::async_trait;
use eventmonitor::{
    AbiSource, CatalogError, EventMonitor, LoopStatus, MonitorConfigBuilder, MonitorError,
    ScanTarget, StaticAbiSource, SyncEnd, SyncError, SyncPhase,
};
use helpers::{
    test_config, token_monitor, transfer_abi, transfer_entry, transfer_history, transfer_topic,
    tx_hash, wait_until, MockLogSource, MockReceiptSource, TOKEN,
};

/// ABI source counting how often it is asked.
#[derive(Default)]
struct CountingAbi {
    inner: StaticAbiSource,
    calls: AtomicUsize,
}

#[async_trait]
impl AbiSource for CountingAbi {
    async fn contract_abis(
        &self,
        contracts: &[Address],
    ) -> Result<HashMap<Address, String>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.contract_abis(contracts).await
    }
}

async fn build(
    contracts: &[&str],
    event_names: Option<Vec<String>>,
    abi: &CountingAbi,
) -> Result<EventMonitor, MonitorError> {
    let logs = Arc::new(MockLogSource::default());
    EventMonitor::new(
        contracts,
        event_names,
        abi,
        logs,
        Arc::new(MockReceiptSource::default()),
        test_config(),
    )
    .await
}

#[tokio::test]
async fn test_inputs_are_validated_before_abi_fetch() {
    let abi = CountingAbi {
        inner: StaticAbiSource::new().with_abi(TOKEN, transfer_abi()),
        ..Default::default()
    };
    let token = TOKEN.to_string();

    let err = build(&["not-an-address"], None, &abi).await.unwrap_err();
    assert!(matches!(err, MonitorError::Catalog(CatalogError::InvalidAddress { .. })));

    let err = build(&[], None, &abi).await.unwrap_err();
    assert!(matches!(err, MonitorError::Catalog(CatalogError::EmptyInput { .. })));

    let err = build(&[token.as_str()], Some(vec!["  ".to_string()]), &abi)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Catalog(CatalogError::InvalidEventName { .. })));

    let err = build(&[token.as_str()], Some(Vec::new()), &abi).await.unwrap_err();
    assert!(matches!(err, MonitorError::Catalog(CatalogError::EmptyInput { .. })));

    assert_eq!(abi.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_abi_and_unknown_events_are_rejected() {
    let abi = CountingAbi::default();
    let err = build(&[TOKEN.to_string().as_str()], None, &abi).await.unwrap_err();
    assert!(matches!(err, MonitorError::Catalog(CatalogError::AbiUnavailable { .. })));

    let abi = CountingAbi {
        inner: StaticAbiSource::new().with_abi(TOKEN, transfer_abi()),
        ..Default::default()
    };
    let err = build(&[TOKEN.to_string().as_str()], Some(vec!["Approval".to_string()]), &abi)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_contract_identifiers_are_normalized() {
    let abi = CountingAbi {
        inner: StaticAbiSource::new().with_abi(TOKEN, transfer_abi()),
        ..Default::default()
    };
    let lower = format!("{TOKEN:#x}");
    let padded = format!("  {TOKEN}  ");

    let monitor = build(&[lower.as_str(), padded.as_str()], None, &abi).await.unwrap();
    assert_eq!(monitor.contracts(), &[TOKEN]);
    assert_eq!(monitor.contract_events(TOKEN).len(), 1);
    assert_eq!(monitor.contract_events(TOKEN)[0].name(), "Transfer");
}

#[tokio::test]
async fn test_allow_list_scopes_targets_and_live_filters() {
    let monitor = token_monitor(
        MockLogSource::default(),
        MockReceiptSource::default(),
        Some(vec!["Transfer".to_string(), "Transfer".to_string()]),
        test_config(),
    )
    .await;

    assert_eq!(monitor.event_names(), Some(&["Transfer".to_string()][..]));
    assert_eq!(
        monitor.scan_targets(),
        &[ScanTarget::event(TOKEN, transfer_topic())]
    );
    assert_eq!(monitor.live_filters().len(), 1);
    assert_eq!(monitor.live_filters()[0].topic(), Some(transfer_topic()));
    assert_eq!(monitor.live_filters()[0].block_range(), None);
}

#[tokio::test]
async fn test_monitor_debug_shows_loop_states() {
    let monitor = token_monitor(
        MockLogSource::default(),
        MockReceiptSource::default(),
        None,
        test_config(),
    )
    .await;

    let debug = format!("{monitor:?}");
    assert!(debug.starts_with("EventMonitor"));
    assert!(debug.contains("sync: Dead"));
}

#[tokio::test]
async fn test_loops_start_dead_and_stop_cleanly() {
    let mut monitor = token_monitor(
        MockLogSource::default(),
        MockReceiptSource::default(),
        None,
        test_config(),
    )
    .await;

    assert_eq!(monitor.sync_status(), LoopStatus::Dead);
    assert_eq!(monitor.monitor_status(), LoopStatus::Dead);
    assert_eq!(monitor.handler_status(), LoopStatus::Dead);

    assert!(monitor.start_monitor().await);
    assert_eq!(monitor.monitor_status(), LoopStatus::Running);
    assert_eq!(monitor.handler_status(), LoopStatus::Running);

    // Starting a running loop is a no-op
    assert!(!monitor.start_monitor().await);
    assert!(!monitor.start_handler().await);

    monitor.stop_monitor();
    assert_ne!(monitor.monitor_status(), LoopStatus::Running);
    wait_until("monitor DEAD", || monitor.monitor_status() == LoopStatus::Dead).await;
    assert_eq!(monitor.handler_status(), LoopStatus::Running);

    monitor.stop_handler();
    wait_until("handler DEAD", || monitor.handler_status() == LoopStatus::Dead).await;

    // And a stopped loop can be started again
    assert!(monitor.start_monitor().await);
    monitor.shutdown().await;
    assert_eq!(monitor.monitor_status(), LoopStatus::Dead);
    assert_eq!(monitor.handler_status(), LoopStatus::Dead);
}

#[tokio::test]
async fn test_sync_runs_to_completion() {
    let history = transfer_history(TOKEN, 0, 200, 1);
    let mut monitor = token_monitor(
        MockLogSource::new(history.clone()),
        MockReceiptSource::from_logs(&history),
        None,
        test_config(),
    )
    .await;

    assert!(monitor.start_sync(0, 200u64).await.unwrap());
    assert_eq!(monitor.handler_status(), LoopStatus::Running);

    let summaries = monitor.wait_sync().await.unwrap().unwrap();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].completed);
    assert_eq!(summaries[0].entries, 201);
    assert_eq!(monitor.sync_status(), LoopStatus::Dead);
    assert_eq!(monitor.sync_progress().phase, SyncPhase::Completed);

    wait_until("all events stored", || monitor.events_list().len() == 201).await;
    assert_eq!(monitor.queue_size(), 0);

    let positions: Vec<_> = monitor.events_sorted().iter().map(|e| e.position()).collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(monitor.handler_stats().stored, 201);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_sync_to_latest_block() {
    let history = transfer_history(TOKEN, 10, 30, 1);
    let logs = MockLogSource::new(history.clone()).with_head(40);
    let receipts = MockReceiptSource::from_logs(&history);
    let mut monitor = token_monitor(logs, receipts, None, test_config()).await;

    monitor.start_sync(5, SyncEnd::Latest).await.unwrap();
    let summaries = monitor.wait_sync().await.unwrap().unwrap();

    assert_eq!(summaries[0].end_block, 40);
    assert_eq!(summaries[0].scanned_to, Some(40));
    wait_until("all events stored", || monitor.events_list().len() == 21).await;
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_reversed_sync_range_is_rejected() {
    let mut monitor = token_monitor(
        MockLogSource::default(),
        MockReceiptSource::default(),
        None,
        test_config(),
    )
    .await;

    let err = monitor.start_sync(10, 5u64).await.unwrap_err();
    assert!(matches!(
        err,
        MonitorError::Sync(SyncError::InvalidRange { start: 10, end: 5 })
    ));
    assert_eq!(monitor.sync_status(), LoopStatus::Dead);
    assert_eq!(monitor.handler_status(), LoopStatus::Dead);
}

#[tokio::test]
async fn test_failed_sync_reports_crash() {
    let logs = MockLogSource::default().with_range_faults(usize::MAX);
    let config = MonitorConfigBuilder::minimal()
        .initial_increment(1)
        .min_increment(1)
        .max_floor_faults(1)
        .build();
    let mut monitor = token_monitor(logs, MockReceiptSource::default(), None, config).await;

    monitor.start_sync(0, 100u64).await.unwrap();
    wait_until("sync CRASH", || monitor.sync_status() == LoopStatus::Crash).await;
    assert_eq!(monitor.sync_progress().phase, SyncPhase::Failed);

    let outcome = monitor.sync_outcome().await.unwrap();
    assert!(matches!(
        outcome,
        Err(MonitorError::Sync(SyncError::IncrementExhausted { from_block: 0, .. }))
    ));

    // Stopping a crashed loop clears its flag
    monitor.stop_sync();
    assert_eq!(monitor.sync_status(), LoopStatus::Dead);
    monitor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stopped_sync_reports_dead_and_cancelled() {
    let logs = MockLogSource::default().with_latency(Duration::from_millis(2));
    // A wide window keeps the increment at 1 for the whole test
    let config = MonitorConfigBuilder::minimal()
        .initial_increment(1)
        .sample_window(10_000)
        .build();
    let mut monitor = token_monitor(logs, MockReceiptSource::default(), None, config).await;

    monitor.start_sync(0, 1_000_000u64).await.unwrap();
    wait_until("sync scanning", || {
        monitor.sync_progress().phase == SyncPhase::Scanning
    })
    .await;
    assert_eq!(monitor.sync_status(), LoopStatus::Running);

    monitor.stop_sync();
    let summaries = monitor.wait_sync().await.unwrap().unwrap();

    assert!(!summaries[0].completed);
    assert!(summaries[0].scanned_to < Some(1_000_000));
    assert_eq!(monitor.sync_status(), LoopStatus::Dead);
    assert_eq!(monitor.sync_progress().phase, SyncPhase::Cancelled);
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_watch_sync_reports_final_progress() {
    let history = transfer_history(TOKEN, 0, 50, 1);
    let mut monitor = token_monitor(
        MockLogSource::new(history.clone()),
        MockReceiptSource::from_logs(&history),
        None,
        test_config(),
    )
    .await;

    monitor.start_sync(0, 50u64).await.unwrap();
    let mut reports = Vec::new();
    monitor
        .watch_sync_with(|progress| reports.push(progress.clone()))
        .await;

    let last = reports.last().unwrap();
    assert_eq!(last.phase, SyncPhase::Completed);
    assert!(last.status.starts_with("Sync complete"));
    assert!(last.status.contains("Goal: 50"));
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_live_polling_records_new_events() {
    let first = vec![
        transfer_entry(TOKEN, 100, 1, tx_hash(1), 10),
        transfer_entry(TOKEN, 100, 2, tx_hash(2), 20),
    ];
    let second = vec![transfer_entry(TOKEN, 101, 0, tx_hash(3), 30)];
    let receipts = MockReceiptSource::from_logs(first.iter().chain(second.iter()));
    let logs = MockLogSource::default();

    let mut monitor = token_monitor(logs.clone(), receipts, None, test_config()).await;
    monitor.start_monitor().await;

    logs.append_logs(first);
    wait_until("first block stored", || monitor.events_list().len() == 2).await;
    logs.append_logs(second);
    wait_until("live events stored", || monitor.events_list().len() == 3).await;
    monitor.shutdown().await;

    assert_eq!(monitor.monitor_status(), LoopStatus::Dead);
    assert_eq!(monitor.handler_stats().stored, 3);
    assert_eq!(monitor.installed_live_filters().await, 0);
}

#[tokio::test]
async fn test_live_filters_cover_entries_mined_while_not_polling() {
    let mined: Vec<_> = (10..=12)
        .map(|block| transfer_entry(TOKEN, block, 0, tx_hash(block), block))
        .collect();
    let logs = MockLogSource::default();
    let mut monitor = token_monitor(
        logs.clone(),
        MockReceiptSource::from_logs(&mined),
        None,
        test_config(),
    )
    .await;
    assert_eq!(monitor.installed_live_filters().await, 1);

    // Mined after construction, before polling starts
    logs.append_logs([mined[0].clone()]);
    monitor.start_monitor().await;
    wait_until("block 10 stored", || monitor.events_list().len() == 1).await;

    logs.append_logs([mined[1].clone()]);
    wait_until("block 11 stored", || monitor.events_list().len() == 2).await;

    monitor.stop_monitor();
    wait_until("monitor DEAD", || monitor.monitor_status() == LoopStatus::Dead).await;

    // Mined while polling is stopped
    logs.append_logs([mined[2].clone()]);
    monitor.start_monitor().await;
    wait_until("block 12 stored", || monitor.events_list().len() == 3).await;
    monitor.shutdown().await;

    let blocks: Vec<_> = monitor.events_sorted().iter().map(|e| e.position().0).collect();
    assert_eq!(blocks, vec![10, 11, 12]);
    // One filter, installed once and kept across the restart
    assert_eq!(logs.live_installs(), 1);
}

#[tokio::test]
async fn test_forgotten_live_filter_is_reinstalled() {
    let entry = transfer_entry(TOKEN, 5, 0, tx_hash(5), 5);
    let logs = MockLogSource::default().with_lost_filters(1);
    let mut monitor = token_monitor(
        logs.clone(),
        MockReceiptSource::from_logs([&entry]),
        None,
        test_config(),
    )
    .await;

    monitor.start_monitor().await;
    wait_until("filter reinstalled", || logs.live_installs() == 2).await;

    logs.append_logs([entry]);
    wait_until("event stored", || monitor.events_list().len() == 1).await;
    assert_eq!(monitor.monitor_status(), LoopStatus::Running);
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_sync_and_live_overlap_is_deduplicated() {
    let history = transfer_history(TOKEN, 0, 20, 1);
    let logs = MockLogSource::new(history.clone());
    let receipts = MockReceiptSource::from_logs(&history);
    let mut monitor = token_monitor(logs.clone(), receipts, None, test_config()).await;

    monitor.start_sync(0, 20u64).await.unwrap();
    monitor.wait_sync().await.unwrap().unwrap();

    // The live filter reports the tail of the backfill again
    logs.append_logs(history[15..].to_vec());
    monitor.start_monitor().await;

    wait_until("overlap handled", || {
        let stats = monitor.handler_stats();
        stats.stored + stats.duplicates == 27
    })
    .await;
    monitor.shutdown().await;

    assert_eq!(monitor.events_list().len(), 21);
    assert_eq!(monitor.handler_stats().duplicates, 6);
}

#[tokio::test]
async fn test_events_sorted_by_block_then_log_index() {
    let batch = vec![
        transfer_entry(TOKEN, 9, 0, tx_hash(1), 1),
        transfer_entry(TOKEN, 3, 7, tx_hash(2), 2),
        transfer_entry(TOKEN, 3, 2, tx_hash(3), 3),
        transfer_entry(TOKEN, 5, 0, tx_hash(4), 4),
    ];
    let receipts = MockReceiptSource::from_logs(&batch);
    let logs = MockLogSource::default();
    let mut monitor = token_monitor(logs.clone(), receipts, None, test_config()).await;

    logs.append_logs(batch);
    monitor.start_monitor().await;
    wait_until("events stored", || monitor.events_list().len() == 4).await;
    monitor.shutdown().await;

    let arrival: Vec<_> = monitor.events_list().iter().map(|e| e.position()).collect();
    assert_eq!(arrival, vec![(9, 0), (3, 7), (3, 2), (5, 0)]);

    let sorted: Vec<_> = monitor.events_sorted().iter().map(|e| e.position()).collect();
    assert_eq!(sorted, vec![(3, 2), (3, 7), (5, 0), (9, 0)]);
    // Sorting is a view, the list keeps arrival order
    assert_eq!(monitor.events_list()[0].position(), (9, 0));
}

#[tokio::test]
async fn test_decoded_events_render_as_json() {
    let entry = transfer_entry(TOKEN, 7, 1, tx_hash(1), 12_345);
    let receipts = MockReceiptSource::from_logs([&entry]);
    let logs = MockLogSource::default();
    let mut monitor = token_monitor(logs.clone(), receipts, None, test_config()).await;

    logs.append_logs([entry]);
    monitor.start_monitor().await;
    wait_until("event stored", || monitor.events_list().len() == 1).await;
    monitor.shutdown().await;

    let json = monitor.events_list()[0].to_json();
    assert_eq!(json["event"], "Transfer");
    assert_eq!(json["args"]["value"], "12345");
    assert_eq!(json["args"]["from"], helpers::ALICE.to_checksum(None));
    assert_eq!(json["block_number"], 7);
}
