//! Error types for the eventmonitor library.
//!
//! This module follows a hybrid approach:
//!
//! - **Area-specific errors** for fine-grained handling ([`CatalogError`],
//!   [`DecodeError`], [`SyncError`], [`RpcError`])
//! - **Unified error type** ([`MonitorError`]) for the public entry points of
//!   [`crate::EventMonitor`]
//!
//! # Taxonomy
//!
//! - Range faults ([`RpcError::RangeTooLarge`]) are absorbed by the range
//!   scanner, which halves its batch size and retries.
//! - Decode failures ([`DecodeError`]) drop a single entry and are counted.
//! - Transport failures are retried with bounded exponential backoff
//!   ([`crate::transport::RetryConfig`]) before giving up on the entry or scan.
//! - Invalid input ([`CatalogError`], [`MonitorError::InvalidInput`]) fails at
//!   the call boundary before any remote call.
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventmonitor::{CatalogError, EventMonitor, MonitorError};
//!
//! match EventMonitor::new(&["not-an-address"], None, abi, logs, receipts, config).await {
//!     Err(MonitorError::Catalog(CatalogError::InvalidAddress { input, .. })) => {
//!         eprintln!("rejected {input}");
//!     }
//!     Err(e) => eprintln!("other error: {e}"),
//!     Ok(_) => unreachable!(),
//! }
//! ```

mod catalog;
mod decode;
mod rpc;
mod sync;

pub use catalog::CatalogError;
pub use decode::DecodeError;
pub use rpc::RpcError;
pub use sync::SyncError;

/// Unified error type for monitor operations.
///
/// All area-specific error types convert to `MonitorError` via `From`, so `?`
/// propagates them naturally.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Error from input validation or catalog construction.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error from a remote collaborator.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Error from historical scanning.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Error from decoding a log entry.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A background task panicked or was aborted.
    #[error("{task} task failed: {details}")]
    TaskFailed {
        /// Which loop failed
        task: &'static str,
        /// Join error text
        details: String,
    },

    /// Invalid input provided to an operation.
    #[error("Invalid input: {details}")]
    InvalidInput {
        /// Details about what was invalid
        details: String,
    },
}

impl MonitorError {
    /// Create an `InvalidInput` error with details.
    pub fn invalid_input(details: impl Into<String>) -> Self {
        MonitorError::InvalidInput {
            details: details.into(),
        }
    }
}
