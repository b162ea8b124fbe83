// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Event catalog and value rendering.
//!
//! This module handles:
//! - Building per-contract event signatures and topic hashes from ABIs
//! - Decoding raw logs against those signatures
//! - Normalizing contract identifiers and event-name allow-lists
//! - Rendering decoded values as JSON

pub mod catalog;
pub mod normalize;

pub use catalog::{
    normalize_addresses, normalize_event_names, EventCatalog, EventParam, EventSignature,
};
