// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Transport layer utilities for Alloy providers.
//!
//! # Retries
//!
//! [`RetryLayer`] retries transient RPC failures with bounded exponential
//! backoff and leaves range faults alone so the range scanner can react to
//! them.
//!
//! ```rust,ignore
//! use eventmonitor::transport::{RetryConfig, RetryLayer};
//! use alloy_rpc_client::ClientBuilder;
//! use alloy_provider::ProviderBuilder;
//!
//! let client = ClientBuilder::default()
//!     .layer(RetryLayer::new(RetryConfig::default()))
//!     .http(rpc_url);
//!
//! let provider = ProviderBuilder::new()
//!     .disable_recommended_fillers()
//!     .connect_client(client);
//! ```

mod retry;

pub use retry::{is_filter_lost, is_range_fault, RetryConfig, RetryLayer, RetryService};
