// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Contract event monitoring for EVM chains.
//!
//! `eventmonitor` discovers, decodes, deduplicates, and accumulates smart
//! contract event logs. A historical backfill ("sync") and a live poll
//! ("monitor") feed one bounded queue, drained by a single decode-and-record
//! handler.
//!
//! - [`EventCatalog`]: event signatures and topic hashes from contract ABIs
//! - [`RangeScanner`]: adaptive batch sizing against provider range limits
//! - [`LivePoller`]: polls live filters for new entries
//! - [`EventHandler`]: deduplicates by `(tx hash, log index)` and decodes
//! - [`EventMonitor`]: owns the three loops and the read API
//!
//! Remote collaborators sit behind the traits in [`source`], with alloy
//! provider-backed implementations in [`RpcLogSource`].

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod events;
pub mod handler;
pub mod lifecycle;
pub mod monitor;
pub mod poller;
pub mod queue;
pub mod scanner;
pub mod source;
pub mod transport;
pub mod types;

mod tracing;

pub use config::{MonitorConfig, MonitorConfigBuilder, ScanSettings};
pub use errors::{CatalogError, DecodeError, MonitorError, RpcError, SyncError};
pub use events::{
    normalize_addresses, normalize_event_names, EventCatalog, EventParam, EventSignature,
};
pub use handler::{EventHandler, EventStore, HandleOutcome, HandlerStats, HandlerStatsSnapshot};
pub use lifecycle::{LoopSlot, LoopStatus};
pub use monitor::EventMonitor;
pub use poller::{LiveFilters, LivePoller};
pub use queue::{EventQueue, PushRejected, QueueConsumer};
pub use scanner::{IncrementTuner, RangeScanner, ScanSummary, ScanTarget, SyncEnd};
pub use source::{
    AbiDirectory, AbiSource, FilterHandle, LogSource, ReceiptSource, RpcFilterHandle,
    RpcLogSource, StaticAbiSource,
};
pub use transport::{RetryConfig, RetryLayer};
pub use types::event::{DecodedArg, DecodedEvent};
pub use types::filter::FilterSpec;
pub use types::log::{EventIdentity, RawLogEntry, Receipt};
pub use types::progress::{SyncPhase, SyncProgress};
