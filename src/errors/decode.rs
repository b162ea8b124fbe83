// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for turning raw log entries into decoded events.
//!
//! Decode failures never stop the handler. They are counted in
//! [`crate::HandlerStats`] and the offending entry is dropped.

use alloy_primitives::{Address, TxHash, B256};

/// Errors that can occur while decoding a single log entry.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// No catalogued event of this contract has the entry's first topic.
    #[error("No event of {address} matches topic {topic:?}")]
    UnknownTopic {
        /// Contract that emitted the log
        address: Address,
        /// First topic of the log, if any
        topic: Option<B256>,
    },

    /// The log's topics or data do not fit the event's ABI.
    #[error("Failed to decode {event}: {details}")]
    AbiMismatch {
        /// Event name the log was matched to
        event: String,
        /// Decoder message
        details: String,
    },

    /// The transaction receipt holds no decodable log for the event.
    #[error("Receipt {tx_hash} has no decodable {event} log")]
    NoMatchingLogs {
        /// Event name the entry was matched to
        event: String,
        /// Transaction whose receipt was inspected
        tx_hash: TxHash,
    },
}

impl DecodeError {
    /// Create an `AbiMismatch` error with details.
    pub fn abi_mismatch(event: impl Into<String>, details: impl Into<String>) -> Self {
        DecodeError::AbiMismatch {
            event: event.into(),
            details: details.into(),
        }
    }
}
