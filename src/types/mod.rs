// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strong types for the monitor's data model.
//!
//! - Raw log entries as delivered by a log source, and their identity
//! - Filter specifications scoped to an address, topic, and block range
//! - Decoded events as stored by the handler
//! - Sync progress published by the range scanner

pub mod event;
pub mod filter;
pub mod log;
pub mod progress;

// Note: Public types are re-exported from lib.rs, not here
