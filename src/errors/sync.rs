// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for historical range scanning.

use alloy_primitives::BlockNumber;

use super::RpcError;

/// Errors that end a historical scan early.
///
/// A scan that fails leaves the sync flag set, which is how callers observe
/// it: [`crate::EventMonitor::sync_status`] reports `CRASH`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The requested interval is empty.
    #[error("Invalid sync range: start {start} is after end {end}")]
    InvalidRange {
        /// First block requested
        start: BlockNumber,
        /// Last block requested
        end: BlockNumber,
    },

    /// The provider kept rejecting queries at the minimum increment.
    #[error("Range faults at the minimum increment from block {from_block}, {attempts} attempts")]
    IncrementExhausted {
        /// Block the scanner was stuck on
        from_block: BlockNumber,
        /// Consecutive faults observed at the floor
        attempts: u32,
    },

    /// A non-range RPC failure outlived the retry budget.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
}
