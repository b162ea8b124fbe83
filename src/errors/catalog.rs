// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for contract input validation and event catalog construction.

use alloy_primitives::Address;

/// Errors raised while validating monitor inputs or building the event catalog.
///
/// These are caller-boundary failures: they are returned before the monitor
/// makes any remote call that depends on the rejected input.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A contract identifier is not a valid 20-byte hex address.
    #[error("Invalid contract address {input:?}: {reason}")]
    InvalidAddress {
        /// The rejected input as given by the caller
        input: String,
        /// Parser message
        reason: String,
    },

    /// A list-valued input was empty.
    #[error("No {what} provided")]
    EmptyInput {
        /// Which input was empty (e.g. "contracts")
        what: &'static str,
    },

    /// An event name in the allow-list is blank.
    #[error("Invalid event name {name:?}")]
    InvalidEventName {
        /// The rejected name
        name: String,
    },

    /// The ABI provider has no document for a contract.
    #[error("ABI unavailable for {address}: {details}")]
    AbiUnavailable {
        /// Contract whose ABI could not be fetched
        address: Address,
        /// Provider message
        details: String,
    },

    /// The ABI document for a contract is not a JSON array of entries.
    #[error("Malformed ABI for {address}: {details}")]
    AbiMalformed {
        /// Contract whose ABI could not be parsed
        address: Address,
        /// Parser message
        details: String,
    },
}

impl CatalogError {
    /// Create an `AbiUnavailable` error with details.
    pub fn abi_unavailable(address: Address, details: impl Into<String>) -> Self {
        CatalogError::AbiUnavailable {
            address,
            details: details.into(),
        }
    }

    /// Create an `AbiMalformed` error with details.
    pub fn abi_malformed(address: Address, details: impl Into<String>) -> Self {
        CatalogError::AbiMalformed {
            address,
            details: details.into(),
        }
    }
}
