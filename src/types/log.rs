// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Raw log entries, their identity, and transaction receipts.

use std::fmt;

use alloy_primitives::{Address, BlockHash, BlockNumber, Bytes, TxHash, B256};
use alloy_rpc_types::{Log, TransactionReceipt};
use serde::{Deserialize, Serialize};

use crate::errors::RpcError;

/// `(transaction hash, log index)`: names exactly one event occurrence.
///
/// The handler uses it as its deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventIdentity {
    /// Transaction that emitted the log
    pub transaction_hash: TxHash,
    /// Position of the log in its block
    pub log_index: u64,
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction_hash, self.log_index)
    }
}

/// A mined log entry as returned by a filter query.
///
/// Unlike [`alloy_rpc_types::Log`], every positional field is present:
/// pending logs are rejected on conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEntry {
    /// Contract that emitted the log
    pub address: Address,
    /// Topic hashes; the first is the event's topic hash for non-anonymous events
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed parameters
    pub data: Bytes,
    /// Block the log was included in
    pub block_number: BlockNumber,
    /// Position of the log in its block
    pub log_index: u64,
    /// Transaction that emitted the log
    pub transaction_hash: TxHash,
    /// Position of the transaction in its block
    pub transaction_index: u64,
    /// Hash of the block the log was included in
    pub block_hash: BlockHash,
}

impl RawLogEntry {
    /// The deduplication key of this entry.
    pub fn identity(&self) -> EventIdentity {
        EventIdentity {
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
        }
    }

    /// The event topic hash, if the log has topics.
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

impl TryFrom<Log> for RawLogEntry {
    type Error = RpcError;

    fn try_from(log: Log) -> Result<Self, Self::Error> {
        let missing = |field: &str| RpcError::invalid_log(format!("log is missing {field}"));

        Ok(Self {
            block_number: log.block_number.ok_or_else(|| missing("block_number"))?,
            log_index: log.log_index.ok_or_else(|| missing("log_index"))?,
            transaction_hash: log.transaction_hash.ok_or_else(|| missing("transaction_hash"))?,
            transaction_index: log
                .transaction_index
                .ok_or_else(|| missing("transaction_index"))?,
            block_hash: log.block_hash.ok_or_else(|| missing("block_hash"))?,
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data,
        })
    }
}

/// The full, decodable log set of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction the receipt belongs to
    pub transaction_hash: TxHash,
    /// Every log emitted by the transaction, in log-index order
    pub logs: Vec<RawLogEntry>,
}

impl TryFrom<TransactionReceipt> for Receipt {
    type Error = RpcError;

    fn try_from(receipt: TransactionReceipt) -> Result<Self, Self::Error> {
        let logs = receipt
            .inner
            .logs()
            .iter()
            .cloned()
            .map(RawLogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            transaction_hash: receipt.transaction_hash,
            logs,
        })
    }
}
