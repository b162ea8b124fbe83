// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Adaptive historical range scanner
//!
//! Covers a block interval `[start, end]` exactly once with batched filter
//! queries, sizing each batch so the number of entries per query converges to
//! a density target.
//!
//! # Algorithm
//!
//! - The first increment is `(end - start) / 100` unless overridden.
//! - A batch covers `[from, min(from + increment, end)]`.
//! - After a successful batch its entry count enters a sliding window. Once
//!   the window is full the increment is rescaled by
//!   `1 + (target - mean) / target`.
//! - A range fault from the provider halves the increment and retries the same
//!   `from` without touching the window.
//! - The increment never drops below the configured minimum. Range faults that
//!   persist at the minimum are retried with backoff a bounded number of times
//!   before the scan fails.
//!
//! Targets of one sync session are scanned one after another, each reporting
//! its own [`SyncProgress`].

use std::{collections::VecDeque, sync::Arc, time::Duration};

use alloy_primitives::{Address, BlockNumber, B256};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::config::ScanSettings;
use crate::errors::{RpcError, SyncError};
use crate::queue::EventQueue;
use crate::source::LogSource;
use crate::tracing::spans;
use crate::transport::RetryConfig;
use crate::types::filter::FilterSpec;
use crate::types::log::RawLogEntry;
use crate::types::progress::{SyncPhase, SyncProgress};

/// Self-tuning batch width.
#[derive(Debug, Clone)]
pub struct IncrementTuner {
    increment: u64,
    min_increment: u64,
    density_target: usize,
    window: usize,
    samples: VecDeque<usize>,
}

impl IncrementTuner {
    /// A tuner starting at `initial`, clamped to the configured minimum.
    pub fn new(initial: u64, settings: &ScanSettings) -> Self {
        let min_increment = settings.min_increment.max(1);
        let window = settings.sample_window.max(1);
        Self {
            increment: initial.max(min_increment),
            min_increment,
            density_target: settings.density_target.max(1),
            window,
            samples: VecDeque::with_capacity(window + 1),
        }
    }

    /// Current increment.
    pub fn increment(&self) -> u64 {
        self.increment
    }

    /// Smallest increment the tuner will use.
    pub fn min_increment(&self) -> u64 {
        self.min_increment
    }

    /// Whether the increment is at its floor.
    pub fn at_floor(&self) -> bool {
        self.increment <= self.min_increment
    }

    /// Entry counts currently in the window, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = usize> + '_ {
        self.samples.iter().copied()
    }

    /// Record a successful batch's entry count and return the new increment.
    ///
    /// The increment only moves once the window is full.
    pub fn record(&mut self, count: usize) -> u64 {
        self.samples.push_back(count);
        if self.samples.len() > self.window {
            self.samples.pop_front();
        }
        if self.samples.len() == self.window {
            let mean = self.samples.iter().sum::<usize>() as f64 / self.window as f64;
            let target = self.density_target as f64;
            let scale = 1.0 + (target - mean) / target;
            // Float to int casts saturate, negative scales land on zero
            let scaled = (self.increment as f64 * scale).floor() as u64;
            self.increment = scaled.max(self.min_increment);
        }
        self.increment
    }

    /// Halve the increment after a range fault and return it.
    pub fn back_off(&mut self) -> u64 {
        self.increment = (self.increment / 2).max(self.min_increment);
        self.increment
    }
}

/// One `(contract, topic)` pair to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    /// Contract to scan
    pub address: Address,
    /// Event topic, or `None` for every event of the contract
    pub topic: Option<B256>,
}

impl ScanTarget {
    /// Every event of `address`.
    pub fn contract(address: Address) -> Self {
        Self {
            address,
            topic: None,
        }
    }

    /// One event of `address`.
    pub fn event(address: Address, topic: B256) -> Self {
        Self {
            address,
            topic: Some(topic),
        }
    }
}

/// Where a sync ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncEnd {
    /// The chain head when the sync starts
    #[default]
    Latest,
    /// A fixed block
    Block(BlockNumber),
}

impl From<BlockNumber> for SyncEnd {
    fn from(block: BlockNumber) -> Self {
        SyncEnd::Block(block)
    }
}

/// Outcome of scanning one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// The scanned target
    pub target: ScanTarget,
    /// First block requested
    pub start_block: BlockNumber,
    /// Last block requested
    pub end_block: BlockNumber,
    /// Last block fully covered, if any
    pub scanned_to: Option<BlockNumber>,
    /// Successful batches
    pub batches: u64,
    /// Entries pushed onto the queue
    pub entries: u64,
    /// Range faults absorbed by halving
    pub range_faults: u64,
    /// Increment when the scan ended
    pub final_increment: u64,
    /// Whether `end_block` was reached
    pub completed: bool,
}

/// Walks block ranges for each target and feeds the event queue.
#[derive(Clone)]
pub struct RangeScanner {
    logs: Arc<dyn LogSource>,
    queue: EventQueue,
    settings: ScanSettings,
    retry: RetryConfig,
    progress: Arc<watch::Sender<SyncProgress>>,
}

impl RangeScanner {
    /// A scanner pushing into `queue` and publishing into `progress`.
    pub fn new(
        logs: Arc<dyn LogSource>,
        queue: EventQueue,
        settings: ScanSettings,
        retry: RetryConfig,
        progress: Arc<watch::Sender<SyncProgress>>,
    ) -> Self {
        Self {
            logs,
            queue,
            settings,
            retry,
            progress,
        }
    }

    /// Scan every target over `[start, end]`, one after another.
    ///
    /// [`SyncEnd::Latest`] is resolved once, before the first target.
    pub async fn sync(
        &self,
        targets: &[ScanTarget],
        start: BlockNumber,
        end: SyncEnd,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScanSummary>, SyncError> {
        let result = self
            .sync_targets(targets, start, end, cancel)
            .instrument(spans::sync_session(targets.len(), start))
            .await;

        let (phase, note) = match &result {
            Ok(summaries)
                if summaries.len() == targets.len() && summaries.iter().all(|s| s.completed) =>
            {
                (SyncPhase::Completed, "Sync complete".to_string())
            }
            Ok(_) => (SyncPhase::Cancelled, "Sync stopped".to_string()),
            Err(e) => (SyncPhase::Failed, format!("Sync failed: {e}")),
        };
        self.progress
            .send_modify(|progress| progress.finish(phase, &note));
        info!(phase = ?phase, "{note}");

        result
    }

    async fn sync_targets(
        &self,
        targets: &[ScanTarget],
        start: BlockNumber,
        end: SyncEnd,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScanSummary>, SyncError> {
        let end = match end {
            SyncEnd::Block(block) => block,
            SyncEnd::Latest => self.logs.latest_block().await?,
        };
        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }

        let mut summaries = Vec::with_capacity(targets.len());
        for target in targets {
            if cancel.is_cancelled() {
                break;
            }
            let summary = self
                .scan(*target, start, end, cancel)
                .instrument(spans::scan_target(target.address, target.topic, start, end))
                .await?;
            let completed = summary.completed;
            summaries.push(summary);
            if !completed {
                break;
            }
        }
        Ok(summaries)
    }

    /// Scan one target over `[start, end]`.
    ///
    /// Returns early with `completed == false` when `cancel` fires; the batch
    /// in flight finishes first.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidRange`] if `start > end`
    /// - [`SyncError::IncrementExhausted`] if range faults persist at the
    ///   minimum increment
    /// - [`SyncError::Rpc`] if another RPC failure outlives the retry budget
    pub async fn scan(
        &self,
        target: ScanTarget,
        start: BlockNumber,
        end: BlockNumber,
        cancel: &CancellationToken,
    ) -> Result<ScanSummary, SyncError> {
        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }

        let initial = self.settings.initial_increment_for(start, end);
        let mut tuner = IncrementTuner::new(initial, &self.settings);
        let mut summary = ScanSummary {
            target,
            start_block: start,
            end_block: end,
            scanned_to: None,
            batches: 0,
            entries: 0,
            range_faults: 0,
            final_increment: tuner.increment(),
            completed: false,
        };

        info!(
            contract = %target.address,
            topic = ?target.topic,
            start_block = start,
            end_block = end,
            increment = tuner.increment(),
            "Starting range scan"
        );

        let mut from = start;
        let mut to = batch_end(from, tuner.increment(), end);
        let mut floor_faults: u32 = 0;
        let mut transport_attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!(contract = %target.address, from_block = from, "Range scan cancelled");
                break;
            }

            self.progress.send_replace(SyncProgress::scanning(
                target.address,
                target.topic,
                from,
                to,
                end,
                tuner.increment(),
            ));

            let spec = FilterSpec::range(target.address, from, to, target.topic)
                .map_err(|_| SyncError::InvalidRange { start: from, end: to })?;
            let fetched = self
                .fetch(&spec)
                .instrument(spans::scan_batch(from, to, tuner.increment()))
                .await;

            match fetched {
                Ok(entries) => {
                    let count = entries.len();
                    if !self.enqueue(entries, cancel).await {
                        info!(
                            contract = %target.address,
                            from_block = from,
                            "Range scan cancelled while queueing"
                        );
                        break;
                    }

                    let increment = tuner.record(count);
                    summary.batches += 1;
                    summary.entries += count as u64;
                    summary.scanned_to = Some(to);
                    floor_faults = 0;
                    transport_attempts = 0;

                    debug!(
                        from_block = from,
                        to_block = to,
                        entries = count,
                        increment = increment,
                        "Scanned batch"
                    );

                    if to >= end {
                        summary.completed = true;
                        break;
                    }
                    from = to + 1;
                    to = batch_end(from, increment, end);
                }
                Err(RpcError::RangeTooLarge { details, .. }) => {
                    summary.range_faults += 1;
                    if tuner.at_floor() {
                        floor_faults += 1;
                        if floor_faults > self.settings.max_floor_faults {
                            return Err(SyncError::IncrementExhausted {
                                from_block: from,
                                attempts: floor_faults,
                            });
                        }
                        let delay = self.retry.backoff(floor_faults - 1);
                        warn!(
                            from_block = from,
                            to_block = to,
                            attempts = floor_faults,
                            delay_ms = delay.as_millis(),
                            details = %details,
                            "Range fault at minimum increment, backing off"
                        );
                        if !pause(delay, cancel).await {
                            break;
                        }
                    } else {
                        let increment = tuner.back_off();
                        warn!(
                            from_block = from,
                            to_block = to,
                            increment = increment,
                            details = %details,
                            "Range too large, halving increment"
                        );
                    }
                    to = batch_end(from, tuner.increment(), end);
                }
                Err(e) if e.is_retryable() && transport_attempts < self.retry.max_retries => {
                    let delay = self.retry.backoff(transport_attempts);
                    transport_attempts += 1;
                    warn!(
                        from_block = from,
                        to_block = to,
                        attempt = transport_attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Batch failed, retrying"
                    );
                    if !pause(delay, cancel).await {
                        break;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        summary.final_increment = tuner.increment();
        info!(
            contract = %target.address,
            topic = ?target.topic,
            batches = summary.batches,
            entries = summary.entries,
            range_faults = summary.range_faults,
            completed = summary.completed,
            "Range scan finished"
        );
        Ok(summary)
    }

    async fn fetch(&self, spec: &FilterSpec) -> Result<Vec<RawLogEntry>, RpcError> {
        let filter = self.logs.open_filter(spec).await?;
        let entries = filter.all_entries().await;
        filter.uninstall().await;
        entries
    }

    async fn enqueue(&self, entries: Vec<RawLogEntry>, cancel: &CancellationToken) -> bool {
        for entry in entries {
            if self.queue.push(entry, cancel).await.is_err() {
                return false;
            }
        }
        true
    }
}

fn batch_end(from: BlockNumber, increment: u64, end: BlockNumber) -> BlockNumber {
    from.saturating_add(increment).min(end)
}

/// Sleep for `delay`; false if `cancel` fired first.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ScanSettings {
        ScanSettings::default()
    }

    #[test]
    fn test_increment_unchanged_until_window_full() {
        let mut tuner = IncrementTuner::new(1_000, &settings());
        for _ in 0..9 {
            assert_eq!(tuner.record(0), 1_000);
        }
        // Ten empty batches: mean 0, scale 2
        assert_eq!(tuner.record(0), 2_000);
    }

    #[test]
    fn test_increment_stable_at_target_density() {
        let mut tuner = IncrementTuner::new(1_000, &settings());
        for _ in 0..50 {
            tuner.record(5_000);
        }
        assert_eq!(tuner.increment(), 1_000);
        assert_eq!(tuner.samples().count(), 10);
    }

    #[test]
    fn test_dense_batches_shrink_increment() {
        let mut tuner = IncrementTuner::new(1_000, &settings());
        for _ in 0..10 {
            tuner.record(7_500);
        }
        assert_eq!(tuner.increment(), 500);
    }

    #[test]
    fn test_very_dense_batches_hit_floor() {
        let mut tuner = IncrementTuner::new(1_000, &settings());
        for _ in 0..10 {
            tuner.record(20_000);
        }
        assert_eq!(tuner.increment(), 1);
        assert!(tuner.at_floor());
    }

    #[test]
    fn test_back_off_halves_and_floors() {
        let mut tuner = IncrementTuner::new(1_000, &settings());
        assert_eq!(tuner.back_off(), 500);
        assert_eq!(tuner.back_off(), 250);

        let mut tuner = IncrementTuner::new(3, &settings());
        assert_eq!(tuner.back_off(), 1);
        assert_eq!(tuner.back_off(), 1);
    }

    #[test]
    fn test_zero_initial_increment_is_clamped() {
        let tuner = IncrementTuner::new(0, &settings());
        assert_eq!(tuner.increment(), 1);
    }

    #[test]
    fn test_batch_end_clamps() {
        assert_eq!(batch_end(100, 50, 120), 120);
        assert_eq!(batch_end(100, 10, 120), 110);
        assert_eq!(batch_end(u64::MAX - 1, 10, u64::MAX), u64::MAX);
    }

    #[test]
    fn test_sync_end_from_block() {
        assert_eq!(SyncEnd::from(42), SyncEnd::Block(42));
        assert_eq!(SyncEnd::default(), SyncEnd::Latest);
    }
}
