// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Provider-backed log and receipt sources
//!
//! Filters are installed on the node with `eth_newFilter`, read with
//! `eth_getFilterLogs` (historical) or `eth_getFilterChanges` (live), and
//! removed with `eth_uninstallFilter`. JSON-RPC errors that say the query
//! covered too much are surfaced as [`RpcError::RangeTooLarge`] so the range
//! scanner can shrink its batch. Polls of a filter the node has forgotten
//! surface as [`RpcError::FilterNotFound`] so the live poller reinstalls it.

use alloy_primitives::{BlockNumber, TxHash, U256};
use alloy_provider::Provider;
use alloy_rpc_types::Log;
use alloy_transport::TransportError;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::RpcError;
use crate::transport::{is_filter_lost, is_range_fault};
use crate::types::filter::FilterSpec;
use crate::types::log::{RawLogEntry, Receipt};

use super::{FilterHandle, LogSource, ReceiptSource};

/// [`LogSource`] and [`ReceiptSource`] over an alloy provider.
///
/// Stack the provider's client with [`crate::transport::RetryLayer`] to retry
/// transient transport errors below this layer.
#[derive(Debug, Clone)]
pub struct RpcLogSource<P> {
    provider: P,
}

impl<P: Provider + Clone + 'static> RpcLogSource<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> LogSource for RpcLogSource<P> {
    async fn open_filter(&self, spec: &FilterSpec) -> Result<Box<dyn FilterHandle>, RpcError> {
        let id = self
            .provider
            .new_filter(&spec.to_filter())
            .await
            .map_err(|e| classify(spec, e, RpcError::filter_install_failed))?;

        debug!(filter = %spec, id = %id, "Installed log filter");

        Ok(Box::new(RpcFilterHandle {
            provider: self.provider.clone(),
            spec: spec.clone(),
            id,
        }))
    }

    async fn latest_block(&self) -> Result<BlockNumber, RpcError> {
        self.provider
            .get_block_number()
            .await
            .map_err(RpcError::get_block_number_failed)
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> ReceiptSource for RpcLogSource<P> {
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Receipt, RpcError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| RpcError::get_receipt_failed(tx_hash, e))?
            .ok_or(RpcError::ReceiptNotFound { tx_hash })?;

        Receipt::try_from(receipt)
    }
}

/// A filter installed on the node.
#[derive(Debug)]
pub struct RpcFilterHandle<P> {
    provider: P,
    spec: FilterSpec,
    id: U256,
}

impl<P> RpcFilterHandle<P> {
    /// Node-assigned filter id.
    pub fn id(&self) -> U256 {
        self.id
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> FilterHandle for RpcFilterHandle<P> {
    fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    async fn all_entries(&self) -> Result<Vec<RawLogEntry>, RpcError> {
        let logs = self
            .provider
            .get_filter_logs(self.id)
            .await
            .map_err(|e| classify(&self.spec, e, RpcError::get_logs_failed))?;

        Ok(into_entries(&self.spec, logs))
    }

    async fn new_entries(&self) -> Result<Vec<RawLogEntry>, RpcError> {
        let logs = self
            .provider
            .get_filter_changes::<Log>(self.id)
            .await
            .map_err(|e| {
                if is_filter_lost(&e) {
                    RpcError::filter_not_found(self.spec.to_string(), e.to_string())
                } else {
                    RpcError::filter_poll_failed(self.spec.to_string(), e)
                }
            })?;

        Ok(into_entries(&self.spec, logs))
    }

    async fn uninstall(&self) {
        if let Err(e) = self.provider.uninstall_filter(self.id).await {
            // Nodes expire idle filters on their own
            debug!(filter = %self.spec, id = %self.id, error = %e, "Failed to uninstall filter");
        }
    }
}

fn classify(
    spec: &FilterSpec,
    error: TransportError,
    otherwise: fn(String, TransportError) -> RpcError,
) -> RpcError {
    match spec.block_range() {
        Some((from, to)) if is_range_fault(&error) => {
            RpcError::range_too_large(from, to, error.to_string())
        }
        _ => otherwise(spec.to_string(), error),
    }
}

fn into_entries(spec: &FilterSpec, logs: Vec<Log>) -> Vec<RawLogEntry> {
    logs.into_iter()
        .filter_map(|log| match RawLogEntry::try_from(log) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(filter = %spec, error = %e, "Skipping incomplete log");
                None
            }
        })
        .collect()
}
