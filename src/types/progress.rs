// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Progress of a historical sync, as published by the range scanner.

use std::fmt;

use alloy_primitives::{Address, BlockNumber, B256};
use serde::{Deserialize, Serialize};

/// Where a sync session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncPhase {
    /// No sync has run yet
    #[default]
    Idle,
    /// A range scan is in progress
    Scanning,
    /// Every target was scanned to the end block
    Completed,
    /// Stopped before reaching the end block
    Cancelled,
    /// Ended by an error
    Failed,
}

/// Snapshot of the range scanner's state for one `(contract, topic)` target.
///
/// Only the scanner writes it; readers receive copies through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Contract being scanned
    pub contract: Address,
    /// Topic the scan is scoped to, if any
    pub topic: Option<B256>,
    /// First block of the current batch
    pub from_block: BlockNumber,
    /// Last block of the current batch
    pub to_block: BlockNumber,
    /// Last block of the whole scan
    pub end_block: BlockNumber,
    /// Width of the current batch
    pub increment: u64,
    /// Session phase
    pub phase: SyncPhase,
    /// Human-readable status line
    pub status: String,
}

impl SyncProgress {
    /// Progress at the start of a batch; `status` is rendered from the fields.
    pub fn scanning(
        contract: Address,
        topic: Option<B256>,
        from_block: BlockNumber,
        to_block: BlockNumber,
        end_block: BlockNumber,
        increment: u64,
    ) -> Self {
        let mut progress = Self {
            contract,
            topic,
            from_block,
            to_block,
            end_block,
            increment,
            phase: SyncPhase::Scanning,
            status: String::new(),
        };
        progress.status = progress.describe();
        progress
    }

    /// Move to a terminal phase, keeping the last range for reference.
    pub fn finish(&mut self, phase: SyncPhase, note: &str) {
        self.phase = phase;
        self.status = format!("{note}. {}", self.describe());
    }

    /// Render the status line from the current fields.
    pub fn describe(&self) -> String {
        let topic = self
            .topic
            .map_or_else(|| "None".to_string(), |topic| topic.to_string());
        format!(
            "Contract: {}, Topic: {topic}, Range: ({} - {}), Goal: {}, Increment: {}",
            self.contract, self.from_block, self.to_block, self.end_block, self.increment
        )
    }
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status)
    }
}
