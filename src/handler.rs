// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Event handler: deduplicate, decode, and record
//!
//! The handler drains the [`EventQueue`] and, for each raw entry:
//!
//! 1. Skips it if its identity `(tx hash, log index)` was already recorded.
//!    Delivery upstream is at-least-once; this is the only deduplication.
//! 2. Resolves the event through the catalog's `(address, topic)` index.
//! 3. Fetches the transaction receipt and decodes every log of that contract
//!    and event in it.
//! 4. Applies the event-name allow-list, if configured.
//! 5. Appends each new decoded event to the [`EventStore`] and marks its
//!    identity as seen.
//!
//! Every entry ends in a [`HandleOutcome`], which is also tallied in
//! [`HandlerStats`]. No outcome stops the loop.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::errors::{DecodeError, RpcError};
use crate::events::catalog::{EventCatalog, EventSignature};
use crate::queue::QueueConsumer;
use crate::source::ReceiptSource;
use crate::tracing::spans;
use crate::transport::RetryConfig;
use crate::types::event::DecodedEvent;
use crate::types::log::{EventIdentity, RawLogEntry, Receipt};

/// Append-only store of decoded events, shared between the handler and
/// readers.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Arc<RwLock<Vec<DecodedEvent>>>,
}

impl EventStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, event: DecodedEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Copy of every event, in arrival order.
    pub fn snapshot(&self) -> Vec<DecodedEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of every event ordered by `(block number, log index)`.
    pub fn sorted(&self) -> Vec<DecodedEvent> {
        let mut events = self.snapshot();
        events.sort_by_key(DecodedEvent::position);
        events
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What became of one raw entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// This many new events were recorded from the entry's receipt
    Stored(usize),
    /// The entry (or every event in its receipt) was already recorded
    Duplicate,
    /// The event is not on the allow-list
    Filtered,
    /// Unknown topic, or nothing in the receipt decoded
    DecodeFailure,
    /// The receipt could not be fetched within the retry budget
    TransportFailure,
}

/// Running totals of handler outcomes.
#[derive(Debug, Default)]
pub struct HandlerStats {
    received: AtomicU64,
    stored: AtomicU64,
    duplicates: AtomicU64,
    filtered: AtomicU64,
    decode_failures: AtomicU64,
    transport_failures: AtomicU64,
}

/// Point-in-time copy of [`HandlerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandlerStatsSnapshot {
    /// Entries taken off the queue
    pub received: u64,
    /// Events recorded
    pub stored: u64,
    /// Entries skipped as already recorded
    pub duplicates: u64,
    /// Entries dropped by the allow-list
    pub filtered: u64,
    /// Entries dropped because they did not decode
    pub decode_failures: u64,
    /// Entries dropped because their receipt could not be fetched
    pub transport_failures: u64,
}

impl HandlerStats {
    fn record(&self, outcome: HandleOutcome) {
        let counter = match outcome {
            HandleOutcome::Stored(n) => {
                self.stored.fetch_add(n as u64, Ordering::Relaxed);
                return;
            }
            HandleOutcome::Duplicate => &self.duplicates,
            HandleOutcome::Filtered => &self.filtered,
            HandleOutcome::DecodeFailure => &self.decode_failures,
            HandleOutcome::TransportFailure => &self.transport_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current totals.
    pub fn snapshot(&self) -> HandlerStatsSnapshot {
        HandlerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
        }
    }
}

/// The single consumer of the event queue.
///
/// Owns the seen-identity set. Shared behind a mutex so that at most one
/// handler loop runs at a time and the set survives restarts.
pub struct EventHandler {
    catalog: Arc<EventCatalog>,
    receipts: Arc<dyn ReceiptSource>,
    allow_list: Option<HashSet<String>>,
    retry: RetryConfig,
    seen: HashSet<EventIdentity>,
    store: EventStore,
    stats: Arc<HandlerStats>,
}

impl EventHandler {
    /// A handler decoding against `catalog`, recording into a fresh store.
    pub fn new(
        catalog: Arc<EventCatalog>,
        receipts: Arc<dyn ReceiptSource>,
        allow_list: Option<Vec<String>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            catalog,
            receipts,
            allow_list: allow_list.map(|names| names.into_iter().collect()),
            retry,
            seen: HashSet::new(),
            store: EventStore::new(),
            stats: Arc::new(HandlerStats::default()),
        }
    }

    /// Handle to the store this handler records into.
    pub fn store(&self) -> EventStore {
        self.store.clone()
    }

    /// Handle to this handler's counters.
    pub fn stats(&self) -> Arc<HandlerStats> {
        self.stats.clone()
    }

    /// Whether an event with this identity was recorded.
    pub fn has_seen(&self, identity: &EventIdentity) -> bool {
        self.seen.contains(identity)
    }

    /// Drain `consumer` until `cancel` fires.
    ///
    /// An entry already taken off the queue is handled to the end before the
    /// cancellation is observed.
    pub async fn run(&mut self, mut consumer: QueueConsumer, cancel: CancellationToken) {
        debug!("Event handler started");
        loop {
            let entry = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                entry = consumer.recv() => match entry {
                    Some(entry) => entry,
                    None => break,
                },
            };
            let span = spans::handle_entry(entry.transaction_hash, entry.log_index);
            self.handle(entry).instrument(span).await;
        }
        debug!("Event handler stopped");
    }

    /// Process one raw entry.
    pub async fn handle(&mut self, entry: RawLogEntry) -> HandleOutcome {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let outcome = self.process(&entry).await;
        self.stats.record(outcome);
        outcome
    }

    async fn process(&mut self, entry: &RawLogEntry) -> HandleOutcome {
        if self.seen.contains(&entry.identity()) {
            return HandleOutcome::Duplicate;
        }

        let Some(signature) = entry
            .topic0()
            .and_then(|topic| self.catalog.lookup(entry.address, topic))
            .cloned()
        else {
            let error = DecodeError::UnknownTopic {
                address: entry.address,
                topic: entry.topic0(),
            };
            warn!(identity = %entry.identity(), error = %error, "Dropping log");
            return HandleOutcome::DecodeFailure;
        };

        // Every log decoded below has this same name
        if !self.allows(signature.name()) {
            debug!(
                identity = %entry.identity(),
                event = signature.name(),
                "Event not on allow-list"
            );
            return HandleOutcome::Filtered;
        }

        let receipt = match self.fetch_receipt(entry).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    identity = %entry.identity(),
                    error = %e,
                    "Dropping log, receipt unavailable"
                );
                return HandleOutcome::TransportFailure;
            }
        };

        let decoded = decode_receipt(&signature, entry, &receipt);
        if decoded.is_empty() {
            let error = DecodeError::NoMatchingLogs {
                event: signature.name().to_string(),
                tx_hash: receipt.transaction_hash,
            };
            warn!(identity = %entry.identity(), error = %error, "Dropping log");
            return HandleOutcome::DecodeFailure;
        }

        let mut stored = 0;
        for event in decoded {
            if self.seen.insert(event.identity()) {
                debug!(
                    identity = %event.identity(),
                    event = %event.event,
                    block_number = event.block_number,
                    "Recorded event"
                );
                self.store.append(event);
                stored += 1;
            }
        }

        if stored == 0 {
            HandleOutcome::Duplicate
        } else {
            HandleOutcome::Stored(stored)
        }
    }

    fn allows(&self, name: &str) -> bool {
        self.allow_list
            .as_ref()
            .is_none_or(|names| names.contains(name))
    }

    async fn fetch_receipt(&self, entry: &RawLogEntry) -> Result<Receipt, RpcError> {
        let mut attempt = 0;
        loop {
            match self.receipts.transaction_receipt(entry.transaction_hash).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    debug!(
                        tx_hash = %entry.transaction_hash,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retrying receipt fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Decode every log of the entry's contract and event in `receipt`.
fn decode_receipt(
    signature: &EventSignature,
    entry: &RawLogEntry,
    receipt: &Receipt,
) -> Vec<DecodedEvent> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == entry.address && log.topic0() == Some(signature.topic()))
        .filter_map(|log| match signature.decode(log) {
            Ok(args) => Some(DecodedEvent {
                event: signature.name().to_string(),
                args,
                transaction_hash: log.transaction_hash,
                log_index: log.log_index,
                transaction_index: log.transaction_index,
                address: log.address,
                block_number: log.block_number,
                block_hash: log.block_hash,
            }),
            Err(e) => {
                warn!(identity = %log.identity(), error = %e, "Skipping undecodable receipt log");
                None
            }
        })
        .collect()
}
