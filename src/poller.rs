// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Live poller
//!
//! [`LiveFilters`] holds one live filter per `(contract, topic)` selector. The
//! monitor installs them when it is built and keeps them until shutdown, so a
//! poll returns everything that appeared since construction, including blocks
//! mined before polling started or while it was stopped.
//!
//! [`LivePoller`] asks every filter, on a fixed interval, for the entries that
//! appeared since the last poll and pushes them onto the event queue. The
//! provider bounds each answer, so there is no batch sizing here.
//!
//! Filters that fail to install are retried on the next tick. A poll that
//! fails transiently is retried on the next tick with the same filter; one
//! that fails for good (the node forgot the filter) sends the selector back to
//! be installed again.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::queue::EventQueue;
use crate::source::{FilterHandle, LogSource};
use crate::tracing::spans;
use crate::types::filter::FilterSpec;

/// Live filters of a monitor, installed or waiting to be.
pub struct LiveFilters {
    installed: Vec<Box<dyn FilterHandle>>,
    pending: Vec<FilterSpec>,
}

impl LiveFilters {
    /// Filters for `specs`, none installed yet.
    pub fn new(specs: Vec<FilterSpec>) -> Self {
        Self {
            installed: Vec::with_capacity(specs.len()),
            pending: specs,
        }
    }

    /// Install filters for `specs` right away.
    ///
    /// Selectors whose install fails stay pending for the poller to retry.
    pub async fn install(logs: &dyn LogSource, specs: Vec<FilterSpec>) -> Self {
        let mut filters = Self::new(specs);
        filters.install_pending(logs).await;
        filters
    }

    /// Number of filters installed on the provider.
    pub fn installed(&self) -> usize {
        self.installed.len()
    }

    /// Selectors still waiting to be installed.
    pub fn pending(&self) -> &[FilterSpec] {
        &self.pending
    }

    /// Try to install every pending filter.
    pub async fn install_pending(&mut self, logs: &dyn LogSource) {
        let mut still_pending = Vec::new();
        for spec in self.pending.drain(..) {
            match logs.open_filter(&spec).await {
                Ok(handle) => {
                    debug!(filter = %spec, "Live filter installed");
                    self.installed.push(handle);
                }
                Err(e) => {
                    warn!(filter = %spec, error = %e, "Failed to install live filter, will retry");
                    still_pending.push(spec);
                }
            }
        }
        self.pending = still_pending;
    }

    /// Remove every installed filter from the provider.
    ///
    /// Their selectors go back to pending, so a later poller reinstalls them.
    pub async fn uninstall_all(&mut self) {
        for handle in self.installed.drain(..) {
            handle.uninstall().await;
            self.pending.push(handle.spec().clone());
        }
    }

    /// Drop the filters at `lost` (ascending indexes) and queue their
    /// selectors for reinstall.
    async fn reinstall_later(&mut self, lost: &[usize]) {
        for &index in lost.iter().rev() {
            let handle = self.installed.remove(index);
            handle.uninstall().await;
            self.pending.push(handle.spec().clone());
        }
    }
}

/// Polls live filters and feeds the event queue.
#[derive(Clone)]
pub struct LivePoller {
    logs: Arc<dyn LogSource>,
    queue: EventQueue,
    filters: Arc<Mutex<LiveFilters>>,
    interval: Duration,
}

impl LivePoller {
    /// A poller over the shared `filters`, ticking every `interval`.
    pub fn new(
        logs: Arc<dyn LogSource>,
        queue: EventQueue,
        filters: Arc<Mutex<LiveFilters>>,
        interval: Duration,
    ) -> Self {
        Self {
            logs,
            queue,
            filters,
            interval,
        }
    }

    /// Poll until `cancel` fires. The filters stay installed.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_ms = self.interval.as_millis(), "Live poller started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let mut filters = self.filters.lock().await;
            filters.install_pending(self.logs.as_ref()).await;
            if self.poll_once(&mut filters, &cancel).await.is_none() {
                break;
            }
        }

        info!("Live poller stopped");
    }

    /// Poll every installed filter once and queue what they return.
    ///
    /// Filters whose poll fails with a non-retryable error are uninstalled and
    /// their selectors go back to pending.
    ///
    /// Returns the number of queued entries, or `None` if `cancel` fired while
    /// waiting for queue room.
    pub async fn poll_once(
        &self,
        filters: &mut LiveFilters,
        cancel: &CancellationToken,
    ) -> Option<usize> {
        let polls = join_all(filters.installed.iter().map(|filter| filter.new_entries()))
            .instrument(spans::poll_filters(filters.installed.len()))
            .await;

        let mut queued = 0;
        let mut lost = Vec::new();
        for (index, result) in polls.into_iter().enumerate() {
            let spec = filters.installed[index].spec();
            match result {
                Ok(entries) => {
                    if !entries.is_empty() {
                        debug!(filter = %spec, entries = entries.len(), "New live entries");
                    }
                    for entry in entries {
                        self.queue.push(entry, cancel).await.ok()?;
                        queued += 1;
                    }
                }
                Err(e) if !e.is_retryable() => {
                    warn!(filter = %spec, error = %e, "Live filter lost, reinstalling");
                    lost.push(index);
                }
                Err(e) => {
                    warn!(filter = %spec, error = %e, "Live poll failed");
                }
            }
        }

        filters.reinstall_later(&lost).await;
        Some(queued)
    }
}
