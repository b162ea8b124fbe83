// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The event monitor
//!
//! [`EventMonitor`] wires the pieces together: it builds the event catalog
//! from the contracts' ABIs, derives the scan targets and live filters, and
//! owns the three loops:
//!
//! - **sync**: the [`RangeScanner`] backfilling a block interval
//! - **monitor**: the [`LivePoller`] following the chain head
//! - **handler**: the [`EventHandler`] draining the shared queue
//!
//! Both producers feed the same bounded [`EventQueue`]; the handler is the only
//! consumer. Starting either producer also starts the handler.
//!
//! The live filters are installed when the monitor is built and stay installed
//! across stop and start of the poller, so entries that appear before polling
//! starts, or while it is stopped, are picked up by the next poll.
//! [`EventMonitor::shutdown`] removes them.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::{fmt, sync::Arc};
//! use eventmonitor::{EventMonitor, MonitorConfig, RpcLogSource, StaticAbiSource, SyncEnd};
//!
//! let source = Arc::new(RpcLogSource::new(provider));
//! let abis = StaticAbiSource::new().with_abi(token, erc20_abi);
//!
//! let mut monitor = EventMonitor::new(
//!     &["0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"],
//!     Some(vec!["Transfer".to_string()]),
//!     &abis,
//!     source.clone(),
//!     source,
//!     MonitorConfig::default(),
//! )
//! .await?;
//!
//! monitor.start_sync(19_000_000, SyncEnd::Latest).await?;
//! monitor.watch_sync().await;
//!
//! for event in monitor.events_sorted() {
//!     println!("{} {}", event.event, event.args_json());
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, BlockNumber};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::errors::{MonitorError, SyncError};
use crate::events::catalog::{
    normalize_addresses, normalize_event_names, EventCatalog, EventSignature,
};
use crate::handler::{EventHandler, EventStore, HandlerStats, HandlerStatsSnapshot};
use crate::lifecycle::{LoopSlot, LoopStatus};
use crate::poller::{LiveFilters, LivePoller};
use crate::queue::EventQueue;
use crate::scanner::{RangeScanner, ScanSummary, ScanTarget, SyncEnd};
use crate::source::{AbiSource, LogSource, ReceiptSource};
use crate::types::event::DecodedEvent;
use crate::types::filter::FilterSpec;
use crate::types::progress::SyncProgress;

type SyncOutput = Result<Vec<ScanSummary>, SyncError>;

/// Historical sync, live polling, and decoding for a set of contracts.
pub struct EventMonitor {
    contracts: Vec<Address>,
    event_names: Option<Vec<String>>,
    catalog: Arc<EventCatalog>,
    targets: Vec<ScanTarget>,
    live_filters: Vec<FilterSpec>,
    live: Arc<Mutex<LiveFilters>>,
    config: MonitorConfig,
    logs: Arc<dyn LogSource>,
    queue: EventQueue,
    handler: Arc<Mutex<EventHandler>>,
    store: EventStore,
    stats: Arc<HandlerStats>,
    progress: Arc<watch::Sender<SyncProgress>>,
    sync_loop: LoopSlot<SyncOutput>,
    monitor_loop: LoopSlot<()>,
    handler_loop: LoopSlot<()>,
}

impl EventMonitor {
    /// Build a monitor for `contracts`.
    ///
    /// Contract identifiers and event names are validated before any remote
    /// call. The ABIs are then fetched once from `abi` and compiled into the
    /// event catalog.
    ///
    /// With an event-name allow-list, one scan target and one live filter are
    /// created per `(name, contract)` pair whose ABI has the event; contracts
    /// lacking a name are skipped with a warning. Without one, each contract
    /// gets an unscoped target and filter. The live filters are installed
    /// here; those that fail to install are retried by the poller.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::Catalog`] for malformed or empty inputs, missing ABIs,
    ///   or ABI documents that are not arrays
    /// - [`MonitorError::InvalidInput`] if no contract has any allow-listed event
    pub async fn new<S: AsRef<str>>(
        contracts: &[S],
        event_names: Option<Vec<String>>,
        abi: &dyn AbiSource,
        logs: Arc<dyn LogSource>,
        receipts: Arc<dyn ReceiptSource>,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        let contracts = normalize_addresses(contracts)?;
        let event_names = event_names
            .map(|names| normalize_event_names(names.as_slice()))
            .transpose()?;

        let abis = abi.contract_abis(&contracts).await?;
        let catalog = Arc::new(EventCatalog::from_abis(&abis)?);

        let targets = scan_targets(&catalog, &contracts, event_names.as_deref());
        if targets.is_empty() {
            return Err(MonitorError::invalid_input(
                "none of the requested events appear in the contracts' ABIs",
            ));
        }
        let live_filters: Vec<FilterSpec> = targets
            .iter()
            .map(|target| FilterSpec::live(target.address, target.topic))
            .collect();
        let live = LiveFilters::install(logs.as_ref(), live_filters.clone()).await;

        info!(
            contracts = contracts.len(),
            events = catalog.len(),
            targets = targets.len(),
            live_filters = live.installed(),
            "Event monitor ready"
        );

        let handler = EventHandler::new(
            catalog.clone(),
            receipts,
            event_names.clone(),
            config.receipt_retry.clone(),
        );
        let store = handler.store();
        let stats = handler.stats();
        let (progress, _) = watch::channel(SyncProgress::default());

        Ok(Self {
            contracts,
            event_names,
            catalog,
            targets,
            live_filters,
            live: Arc::new(Mutex::new(live)),
            queue: EventQueue::new(config.queue_capacity),
            config,
            logs,
            handler: Arc::new(Mutex::new(handler)),
            store,
            stats,
            progress: Arc::new(progress),
            sync_loop: LoopSlot::new("sync"),
            monitor_loop: LoopSlot::new("monitor"),
            handler_loop: LoopSlot::new("handler"),
        })
    }

    /// Monitored contracts, in the order given.
    pub fn contracts(&self) -> &[Address] {
        &self.contracts
    }

    /// The event-name allow-list, if one was given.
    pub fn event_names(&self) -> Option<&[String]> {
        self.event_names.as_deref()
    }

    /// The event catalog of every monitored contract.
    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    /// Catalogued events of one contract.
    pub fn contract_events(&self, address: Address) -> &[Arc<EventSignature>] {
        self.catalog.events(address)
    }

    /// `(contract, topic)` pairs the sync scans.
    pub fn scan_targets(&self) -> &[ScanTarget] {
        &self.targets
    }

    /// Selectors of the live filters.
    pub fn live_filters(&self) -> &[FilterSpec] {
        &self.live_filters
    }

    /// Live filters currently installed on the provider.
    pub async fn installed_live_filters(&self) -> usize {
        self.live.lock().await.installed()
    }

    /// Decoded events in arrival order.
    pub fn events_list(&self) -> Vec<DecodedEvent> {
        self.store.snapshot()
    }

    /// Decoded events ordered by `(block number, log index)`.
    ///
    /// The order does not depend on how sync and live entries interleaved.
    pub fn events_sorted(&self) -> Vec<DecodedEvent> {
        self.store.sorted()
    }

    /// Entries waiting in the queue.
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Handler outcome totals.
    pub fn handler_stats(&self) -> HandlerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Latest progress of the historical sync.
    pub fn sync_progress(&self) -> SyncProgress {
        self.progress.borrow().clone()
    }

    /// Receiver notified on every progress update.
    pub fn subscribe_progress(&self) -> watch::Receiver<SyncProgress> {
        self.progress.subscribe()
    }

    /// Start the event handler. No-op if it is running.
    pub async fn start_handler(&mut self) -> bool {
        let handler = self.handler.clone();
        let queue = self.queue.clone();
        self.handler_loop
            .start(|cancel| async move {
                let mut handler = handler.lock_owned().await;
                let consumer = queue.consumer().await;
                handler.run(consumer, cancel).await;
            })
            .await
    }

    /// Ask the handler to stop after its current entry.
    pub fn stop_handler(&mut self) {
        self.handler_loop.stop();
    }

    /// Status of the handler loop.
    pub fn handler_status(&self) -> LoopStatus {
        self.handler_loop.status()
    }

    /// Start live polling, and the handler. No-op if polling is running.
    pub async fn start_monitor(&mut self) -> bool {
        self.start_handler().await;

        let poller = LivePoller::new(
            self.logs.clone(),
            self.queue.clone(),
            self.live.clone(),
            self.config.poll_interval,
        );
        self.monitor_loop
            .start(|cancel| async move { poller.run(cancel).await })
            .await
    }

    /// Ask the live poller to stop after its current tick.
    pub fn stop_monitor(&mut self) {
        self.monitor_loop.stop();
    }

    /// Status of the live poller loop.
    pub fn monitor_status(&self) -> LoopStatus {
        self.monitor_loop.status()
    }

    /// Start a historical sync over `[start, end]`, and the handler.
    ///
    /// No-op (returns `Ok(false)`) if a sync is running. A sync that reaches
    /// its end block clears its own flag and reports [`LoopStatus::Dead`]; one
    /// that fails keeps it set and reports [`LoopStatus::Crash`]. Stopping a
    /// sync discards its position: a new sync starts over from `start`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Sync`] if `end` is a block before `start`.
    pub async fn start_sync(
        &mut self,
        start: BlockNumber,
        end: impl Into<SyncEnd>,
    ) -> Result<bool, MonitorError> {
        let end = end.into();
        if let SyncEnd::Block(end) = end {
            if start > end {
                return Err(SyncError::InvalidRange { start, end }.into());
            }
        }

        self.start_handler().await;

        let scanner = RangeScanner::new(
            self.logs.clone(),
            self.queue.clone(),
            self.config.scan.clone(),
            self.config.scan_retry.clone(),
            self.progress.clone(),
        );
        let targets = self.targets.clone();
        Ok(self
            .sync_loop
            .start(|cancel| async move {
                let result = scanner.sync(&targets, start, end, &cancel).await;
                match &result {
                    // Finished or stopped: clear the flag so status reads DEAD
                    Ok(_) => cancel.cancel(),
                    Err(e) => warn!(error = %e, "Sync failed"),
                }
                result
            })
            .await)
    }

    /// Ask the sync to stop after its current batch.
    pub fn stop_sync(&mut self) {
        self.sync_loop.stop();
    }

    /// Status of the sync loop.
    pub fn sync_status(&self) -> LoopStatus {
        self.sync_loop.status()
    }

    /// Result of the last sync, once its task has ended.
    ///
    /// Returns `None` while the sync runs, or if the result was already taken.
    pub async fn sync_outcome(&mut self) -> Option<Result<Vec<ScanSummary>, MonitorError>> {
        let joined = self.sync_loop.finished().await?;
        Some(sync_result(joined))
    }

    /// Wait for the sync task to end and return its result.
    ///
    /// Returns `None` if no sync was started or its result was already taken.
    pub async fn wait_sync(&mut self) -> Option<Result<Vec<ScanSummary>, MonitorError>> {
        let joined = self.sync_loop.join().await?;
        Some(sync_result(joined))
    }

    /// Print the sync status line every `watch_interval` while the sync runs.
    pub async fn watch_sync(&self) {
        self.watch_sync_with(|progress| println!("{}", progress.status))
            .await
    }

    /// Call `report` with the sync progress every `watch_interval` while the
    /// sync runs, and once more with the final progress.
    pub async fn watch_sync_with<F: FnMut(&SyncProgress)>(&self, mut report: F) {
        let mut ticker = tokio::time::interval(self.config.watch_interval);
        while self.sync_status() == LoopStatus::Running {
            ticker.tick().await;
            report(&self.progress.borrow());
        }
        report(&self.progress.borrow());
    }

    /// Stop every loop, wait for each to finish, and uninstall the live
    /// filters.
    ///
    /// Producers stop first, so the handler drains what they queued before
    /// their cancellation until its own stop. Starting the monitor again
    /// reinstalls the filters.
    pub async fn shutdown(&mut self) {
        self.sync_loop.stop();
        self.monitor_loop.stop();
        if let Some(Err(e)) = self.sync_loop.join().await {
            warn!(error = %e, "Sync task ended abnormally");
        }
        if let Some(Err(e)) = self.monitor_loop.join().await {
            warn!(error = %e, "Monitor task ended abnormally");
        }
        if let Some(Err(e)) = self.handler_loop.shutdown().await {
            warn!(error = %e, "Handler task ended abnormally");
        }
        self.live.lock().await.uninstall_all().await;
        info!(
            events = self.store.len(),
            queued = self.queue.len(),
            "Event monitor shut down"
        );
    }
}

impl fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventMonitor")
            .field("contracts", &self.contracts)
            .field("event_names", &self.event_names)
            .field("targets", &self.targets)
            .field("live_filters", &self.live_filters)
            .field("sync", &self.sync_loop.status())
            .field("monitor", &self.monitor_loop.status())
            .field("handler", &self.handler_loop.status())
            .finish_non_exhaustive()
    }
}

fn sync_result(
    joined: Result<SyncOutput, tokio::task::JoinError>,
) -> Result<Vec<ScanSummary>, MonitorError> {
    match joined {
        Ok(result) => result.map_err(MonitorError::from),
        Err(e) => Err(MonitorError::TaskFailed {
            task: "sync",
            details: e.to_string(),
        }),
    }
}

/// Scan targets for the contracts, scoped by the allow-list if there is one.
fn scan_targets(
    catalog: &EventCatalog,
    contracts: &[Address],
    event_names: Option<&[String]>,
) -> Vec<ScanTarget> {
    let Some(names) = event_names else {
        return contracts.iter().copied().map(ScanTarget::contract).collect();
    };

    let mut targets = Vec::new();
    for name in names {
        for contract in contracts {
            match catalog.topic_for(*contract, name) {
                Some(topic) => targets.push(ScanTarget::event(*contract, topic)),
                None => warn!(contract = %contract, event = %name, "Contract has no such event"),
            }
        }
    }
    targets
}
