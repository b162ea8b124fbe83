// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Span creation helpers for monitor operations.
//!
//! Telemetry stays out of the business logic: each instrumented operation has
//! a span helper here, attached at the call site with
//! [`tracing::Instrument`].
//!
//! ```rust,ignore
//! scanner
//!     .scan(target, start, end)
//!     .instrument(spans::scan_target(target.address, target.topic, start, end))
//!     .await
//! ```

use alloy_primitives::{Address, BlockNumber, TxHash, B256};
use tracing::{Level, Span};

/// Span for a whole historical sync over every target.
///
/// Parent: None (root span for this operation)
/// Children: scan_target spans
#[inline]
pub(crate) fn sync_session(targets: usize, start_block: BlockNumber) -> Span {
    tracing::span!(
        Level::INFO,
        "eventmonitor.sync",
        targets = targets,
        start_block = start_block,
    )
}

/// Span for scanning one `(contract, topic)` target to its end block.
///
/// Parent: sync_session span
/// Children: scan_batch spans
#[inline]
pub(crate) fn scan_target(
    contract: Address,
    topic: Option<B256>,
    start_block: BlockNumber,
    end_block: BlockNumber,
) -> Span {
    tracing::info_span!(
        "eventmonitor.scan_target",
        contract = %contract,
        topic = ?topic,
        start_block = start_block,
        end_block = end_block,
    )
}

/// Span for one filter round trip of the range scanner.
///
/// Parent: scan_target span
#[inline]
pub(crate) fn scan_batch(from_block: BlockNumber, to_block: BlockNumber, increment: u64) -> Span {
    tracing::debug_span!(
        "eventmonitor.scan_batch",
        from_block = from_block,
        to_block = to_block,
        increment = increment,
    )
}

/// Span for one live-poller tick over every installed filter.
///
/// Parent: None
#[inline]
pub(crate) fn poll_filters(filters: usize) -> Span {
    tracing::trace_span!("eventmonitor.poll_filters", filters = filters)
}

/// Span for handling one queued log entry.
///
/// Parent: None
/// Children: receipt retrieval for raw entries
#[inline]
pub(crate) fn handle_entry(tx_hash: TxHash, log_index: u64) -> Span {
    tracing::trace_span!(
        "eventmonitor.handle_entry",
        tx_hash = %tx_hash,
        log_index = log_index,
    )
}
