// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Shared RPC error types for the log, filter, and receipt collaborators.
//!
//! Every remote call the monitor makes goes through one of the traits in
//! [`crate::source`], and all of them fail with [`RpcError`]. The variants
//! keep enough context (block ranges, transaction hashes) to make a log line
//! useful on its own.

use alloy_primitives::{BlockNumber, TxHash};

/// Errors that can occur during blockchain RPC operations.
///
/// # Examples
///
/// ```rust
/// use eventmonitor::RpcError;
///
/// let error = RpcError::range_too_large(100, 200, "query returned more than 10000 results");
/// assert!(error.is_range_too_large());
/// assert!(!error.is_retryable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Failed to fetch logs for a filter.
    #[error("Failed to fetch logs for {operation}")]
    GetLogsFailed {
        /// Description of the query that failed (e.g. "0xabc.. blocks 100-200")
        operation: String,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The provider refused a historical query because the block range or the
    /// result set was too large.
    ///
    /// The range scanner handles this by halving its increment; it is never
    /// surfaced to callers of the monitor.
    #[error("Block range {from_block}-{to_block} too large: {details}")]
    RangeTooLarge {
        /// First block of the rejected range
        from_block: BlockNumber,
        /// Last block of the rejected range
        to_block: BlockNumber,
        /// Provider message
        details: String,
    },

    /// Installing a log filter on the provider failed.
    #[error("Failed to install filter for {operation}")]
    FilterInstallFailed {
        /// Description of the filter being installed
        operation: String,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Polling an installed filter for new entries failed.
    #[error("Failed to poll filter for {operation}")]
    FilterPollFailed {
        /// Description of the filter being polled
        operation: String,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The node no longer knows an installed filter.
    ///
    /// Nodes drop filters that sit idle too long, and load-balanced endpoints
    /// may route a poll to a node that never saw the install. Polling the same
    /// id again cannot succeed; the filter has to be installed anew.
    #[error("Filter for {operation} is gone: {details}")]
    FilterNotFound {
        /// Description of the filter being polled
        operation: String,
        /// Provider message
        details: String,
    },

    /// Receipt was not found for a transaction.
    ///
    /// This can occur if the provider hasn't indexed the receipt yet.
    #[error("Receipt not found for transaction: {tx_hash}")]
    ReceiptNotFound {
        /// The transaction hash whose receipt wasn't found
        tx_hash: TxHash,
    },

    /// Fetching a transaction receipt failed.
    #[error("Failed to fetch receipt for transaction {tx_hash}")]
    GetReceiptFailed {
        /// The transaction hash we tried to fetch
        tx_hash: TxHash,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to fetch the current block number.
    #[error("Failed to get current block number")]
    GetBlockNumberFailed {
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A log returned by the provider is missing fields the monitor needs
    /// (pending logs carry no block number, hash, or index).
    #[error("Invalid log entry: {details}")]
    InvalidLog {
        /// What was missing or malformed
        details: String,
    },

    /// The configured RPC URL could not be parsed.
    #[error("Invalid provider URL: {0}")]
    ProviderUrlInvalid(String),
}

impl RpcError {
    /// Helper to create a `GetLogsFailed` error from any error type.
    pub fn get_logs_failed(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::GetLogsFailed {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create a `RangeTooLarge` error.
    pub fn range_too_large(
        from_block: BlockNumber,
        to_block: BlockNumber,
        details: impl Into<String>,
    ) -> Self {
        RpcError::RangeTooLarge {
            from_block,
            to_block,
            details: details.into(),
        }
    }

    /// Helper to create a `FilterInstallFailed` error from any error type.
    pub fn filter_install_failed(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::FilterInstallFailed {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create a `FilterPollFailed` error from any error type.
    pub fn filter_poll_failed(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::FilterPollFailed {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create a `FilterNotFound` error.
    pub fn filter_not_found(operation: impl Into<String>, details: impl Into<String>) -> Self {
        RpcError::FilterNotFound {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Helper to create a `GetReceiptFailed` error from any error type.
    pub fn get_receipt_failed(
        tx_hash: TxHash,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::GetReceiptFailed {
            tx_hash,
            source: Box::new(source),
        }
    }

    /// Helper to create a `GetBlockNumberFailed` error from any error type.
    pub fn get_block_number_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        RpcError::GetBlockNumberFailed {
            source: Box::new(source),
        }
    }

    /// Create an `InvalidLog` error with details.
    pub fn invalid_log(details: impl Into<String>) -> Self {
        RpcError::InvalidLog {
            details: details.into(),
        }
    }

    /// Whether the provider rejected a query for being too large.
    pub fn is_range_too_large(&self) -> bool {
        matches!(self, RpcError::RangeTooLarge { .. })
    }

    /// Whether the node forgot the filter a poll was aimed at.
    pub fn is_filter_lost(&self) -> bool {
        matches!(self, RpcError::FilterNotFound { .. })
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Range faults are excluded: retrying them unchanged fails again, the
    /// caller has to shrink the range instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::GetLogsFailed { .. }
                | RpcError::FilterInstallFailed { .. }
                | RpcError::FilterPollFailed { .. }
                | RpcError::ReceiptNotFound { .. }
                | RpcError::GetReceiptFailed { .. }
                | RpcError::GetBlockNumberFailed { .. }
        )
    }
}
