// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Log filter specifications.
//!
//! A [`FilterSpec`] is the immutable selector a filter handle is opened with.
//! Changing the range means opening a new filter from a new spec.

use std::fmt;

use alloy_primitives::{Address, BlockNumber, B256};
use alloy_rpc_types::Filter;
use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;

/// Address, optional topic, and optional block range of a log filter.
///
/// Historical specs carry both bounds (`from_block <= to_block`); live specs
/// carry none and follow the chain head.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSpec {
    address: Address,
    topic: Option<B256>,
    from_block: Option<BlockNumber>,
    to_block: Option<BlockNumber>,
}

impl FilterSpec {
    /// A historical filter over `[from_block, to_block]`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidInput`] if `from_block > to_block`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use eventmonitor::FilterSpec;
    /// use alloy_primitives::Address;
    ///
    /// let spec = FilterSpec::range(Address::ZERO, 100, 200, None).unwrap();
    /// assert_eq!(spec.block_range(), Some((100, 200)));
    ///
    /// assert!(FilterSpec::range(Address::ZERO, 200, 100, None).is_err());
    /// ```
    pub fn range(
        address: Address,
        from_block: BlockNumber,
        to_block: BlockNumber,
        topic: Option<B256>,
    ) -> Result<Self, MonitorError> {
        if from_block > to_block {
            return Err(MonitorError::invalid_input(format!(
                "filter range {from_block}-{to_block} is reversed"
            )));
        }
        Ok(Self {
            address,
            topic,
            from_block: Some(from_block),
            to_block: Some(to_block),
        })
    }

    /// A live filter following the chain head.
    pub fn live(address: Address, topic: Option<B256>) -> Self {
        Self {
            address,
            topic,
            from_block: None,
            to_block: None,
        }
    }

    /// Contract the filter selects.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Event topic the filter selects, if scoped to one.
    pub fn topic(&self) -> Option<B256> {
        self.topic
    }

    /// `(from_block, to_block)` for historical filters.
    pub fn block_range(&self) -> Option<(BlockNumber, BlockNumber)> {
        self.from_block.zip(self.to_block)
    }

    /// Whether `block_number` falls inside the filter's range.
    ///
    /// Live filters have no range and contain every block.
    pub fn contains_block(&self, block_number: BlockNumber) -> bool {
        match self.block_range() {
            Some((from, to)) => (from..=to).contains(&block_number),
            None => true,
        }
    }

    /// Whether a log with this address and first topic matches the filter.
    pub fn matches(&self, address: Address, topic0: Option<B256>) -> bool {
        self.address == address && self.topic.is_none_or(|topic| Some(topic) == topic0)
    }

    /// The equivalent alloy RPC filter.
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new().address(self.address);
        if let Some(topic) = self.topic {
            filter = filter.event_signature(topic);
        }
        if let Some(from) = self.from_block {
            filter = filter.from_block(from);
        }
        if let Some(to) = self.to_block {
            filter = filter.to_block(to);
        }
        filter
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        if let Some(topic) = self.topic {
            write!(f, " topic {topic}")?;
        }
        match self.block_range() {
            Some((from, to)) => write!(f, " blocks {from}-{to}"),
            None => write!(f, " live"),
        }
    }
}
