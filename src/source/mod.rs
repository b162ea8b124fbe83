// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Remote collaborators the monitor consumes
//!
//! The monitor never talks to a node directly. It consumes three capabilities,
//! each behind a trait so tests can script them:
//!
//! - [`AbiSource`]: contract ABI lookup by address
//! - [`LogSource`]: log filters over a block range, plus the chain head
//! - [`ReceiptSource`]: transaction receipt lookup
//!
//! [`RpcLogSource`] implements both [`LogSource`] and [`ReceiptSource`] over an
//! alloy [`Provider`](alloy_provider::Provider). [`StaticAbiSource`] and
//! [`AbiDirectory`] serve ABIs from memory and from disk.

mod abi;
mod rpc;

use std::collections::HashMap;

use alloy_primitives::{Address, BlockNumber, TxHash};
use async_trait::async_trait;

use crate::errors::{CatalogError, RpcError};
use crate::types::filter::FilterSpec;
use crate::types::log::{RawLogEntry, Receipt};

pub use abi::{AbiDirectory, StaticAbiSource};
pub use rpc::{RpcFilterHandle, RpcLogSource};

/// Source of contract ABI documents.
#[async_trait]
pub trait AbiSource: Send + Sync {
    /// Fetch one ABI document per address.
    ///
    /// Documents are JSON arrays of ABI entries, or JSON strings holding such
    /// an array. Every requested address must be present in the result.
    async fn contract_abis(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, String>, CatalogError>;
}

/// Source of event logs.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Open a filter for `spec`.
    ///
    /// Filters are immutable: covering a different range means opening a new
    /// one. Providers may reject oversized ranges here already, with
    /// [`RpcError::RangeTooLarge`].
    async fn open_filter(&self, spec: &FilterSpec) -> Result<Box<dyn FilterHandle>, RpcError>;

    /// Current chain head.
    async fn latest_block(&self) -> Result<BlockNumber, RpcError>;
}

/// An open log filter.
#[async_trait]
pub trait FilterHandle: Send + Sync {
    /// The selector this filter was opened with.
    fn spec(&self) -> &FilterSpec;

    /// Every entry in the filter's range.
    ///
    /// Fails with [`RpcError::RangeTooLarge`] when the provider refuses the
    /// range or result size.
    async fn all_entries(&self) -> Result<Vec<RawLogEntry>, RpcError>;

    /// Entries that appeared since the previous call, or since the filter
    /// was installed for the first call.
    ///
    /// Fails with [`RpcError::FilterNotFound`] once the node has forgotten
    /// the filter.
    async fn new_entries(&self) -> Result<Vec<RawLogEntry>, RpcError>;

    /// Release provider-side resources held by the filter.
    async fn uninstall(&self) {}
}

/// Source of transaction receipts.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// Full receipt of `tx_hash`, with every log the transaction emitted.
    ///
    /// Fails with [`RpcError::ReceiptNotFound`] if the provider has no receipt
    /// for the transaction (yet).
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Receipt, RpcError>;
}
