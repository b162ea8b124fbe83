// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Decoded events as stored by the handler.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, BlockHash, BlockNumber, TxHash};
use serde_json::{json, Map, Value};

use crate::events::normalize::to_json;

use super::log::EventIdentity;

/// One decoded event argument, in ABI declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArg {
    /// Parameter name from the ABI (`arg{i}` when the ABI leaves it blank)
    pub name: String,
    /// Decoded value; indexed reference types decode to their 32-byte hash
    pub value: DynSolValue,
}

/// An event occurrence decoded against its contract's ABI.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Event name from the ABI
    pub event: String,
    /// Decoded arguments in declaration order
    pub args: Vec<DecodedArg>,
    /// Transaction that emitted the event
    pub transaction_hash: TxHash,
    /// Position of the log in its block
    pub log_index: u64,
    /// Position of the transaction in its block
    pub transaction_index: u64,
    /// Contract that emitted the event
    pub address: Address,
    /// Block the event was included in
    pub block_number: BlockNumber,
    /// Hash of that block
    pub block_hash: BlockHash,
}

impl DecodedEvent {
    /// The deduplication key of this event.
    pub fn identity(&self) -> EventIdentity {
        EventIdentity {
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
        }
    }

    /// The ordering key used by [`crate::EventMonitor::events_sorted`].
    pub fn position(&self) -> (BlockNumber, u64) {
        (self.block_number, self.log_index)
    }

    /// Look up an argument by name.
    pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }

    /// Arguments as a JSON object keyed by parameter name.
    pub fn args_json(&self) -> Value {
        let args: Map<String, Value> = self
            .args
            .iter()
            .map(|arg| (arg.name.clone(), to_json(&arg.value)))
            .collect();
        Value::Object(args)
    }

    /// The whole event as a flat JSON record.
    pub fn to_json(&self) -> Value {
        json!({
            "event": self.event,
            "args": self.args_json(),
            "transaction": self.transaction_hash.to_string(),
            "log_index": self.log_index,
            "transaction_index": self.transaction_index,
            "address": self.address.to_checksum(None),
            "block_number": self.block_number,
            "block": self.block_hash.to_string(),
        })
    }
}
