// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven runner behind the `eventmonitor` binary.
//!
//! | Variable           | Meaning                                       | Default  |
//! |--------------------|-----------------------------------------------|----------|
//! | `RPC_URL`          | JSON-RPC endpoint                             | required |
//! | `CONTRACTS`        | Comma-separated contract addresses            | required |
//! | `ABI_DIR`          | Directory of `<address>.json` ABI files       | `abis`   |
//! | `EVENT_NAMES`      | Comma-separated event-name allow-list         | all      |
//! | `SYNC_FROM`        | First block to backfill; no sync when unset   | unset    |
//! | `SYNC_TO`          | Last block to backfill, or `latest`           | `latest` |
//! | `POLL_INTERVAL_MS` | Live poll interval                            | 2000     |
//! | `QUEUE_CAPACITY`   | Event queue bound                             | 10000    |

use std::{path::PathBuf, sync::Arc, time::Duration};

use alloy_primitives::BlockNumber;
use alloy_provider::ProviderBuilder;
use alloy_rpc_client::ClientBuilder;
use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;

use crate::config::{constants::DEFAULT_QUEUE_CAPACITY, MonitorConfigBuilder};
use crate::errors::RpcError;
use crate::monitor::EventMonitor;
use crate::scanner::SyncEnd;
use crate::source::{AbiDirectory, RpcLogSource};
use crate::transport::RetryLayer;

/// Settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Contract identifiers as given
    pub contracts: Vec<String>,
    /// Directory holding the ABI files
    pub abi_dir: PathBuf,
    /// Event-name allow-list
    pub event_names: Option<Vec<String>>,
    /// Backfill interval, if a sync was requested
    pub sync: Option<(BlockNumber, SyncEnd)>,
    /// Live poll interval
    pub poll_interval: Duration,
    /// Event queue bound
    pub queue_capacity: usize,
}

impl RunnerConfig {
    /// Read the settings from the process environment (and `.env`).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Read the settings through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let rpc_url = lookup("RPC_URL").context("RPC_URL must be set")?;
        let contracts = split_list(&lookup("CONTRACTS").context("CONTRACTS must be set")?);
        let abi_dir = lookup("ABI_DIR").map_or_else(|| PathBuf::from("abis"), PathBuf::from);
        let event_names = lookup("EVENT_NAMES")
            .map(|names| split_list(&names))
            .filter(|names| !names.is_empty());

        let sync = match lookup("SYNC_FROM") {
            Some(from) => {
                let from = from
                    .trim()
                    .parse::<BlockNumber>()
                    .context("SYNC_FROM must be a block number")?;
                let to = match lookup("SYNC_TO").as_deref().map(str::trim) {
                    None | Some("") | Some("latest") => SyncEnd::Latest,
                    Some(block) => SyncEnd::Block(
                        block
                            .parse()
                            .context("SYNC_TO must be a block number or 'latest'")?,
                    ),
                };
                Some((from, to))
            }
            None => None,
        };

        let poll_interval = lookup("POLL_INTERVAL_MS")
            .map(|ms| ms.trim().parse::<u64>())
            .transpose()
            .context("POLL_INTERVAL_MS must be a number of milliseconds")?
            .map_or(crate::config::constants::DEFAULT_POLL_INTERVAL, Duration::from_millis);
        let queue_capacity = lookup("QUEUE_CAPACITY")
            .map(|n| n.trim().parse::<usize>())
            .transpose()
            .context("QUEUE_CAPACITY must be a number")?
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        Ok(Self {
            rpc_url,
            contracts,
            abi_dir,
            event_names,
            sync,
            poll_interval,
            queue_capacity,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Main entry point for the binary.
///
/// Runs the optional backfill to completion, then follows the chain head
/// until Ctrl-C, and prints every decoded event as a JSON line.
pub async fn run() -> anyhow::Result<()> {
    let settings = RunnerConfig::from_env()?;

    let url: url::Url = settings
        .rpc_url
        .parse()
        .map_err(|e| RpcError::ProviderUrlInvalid(format!("{e}")))?;
    let client = ClientBuilder::default()
        .layer(RetryLayer::default())
        .http(url);
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_client(client);
    let source = Arc::new(RpcLogSource::new(provider));

    let config = MonitorConfigBuilder::new()
        .poll_interval(settings.poll_interval)
        .queue_capacity(settings.queue_capacity)
        .build();

    let mut monitor = EventMonitor::new(
        settings.contracts.as_slice(),
        settings.event_names.clone(),
        &AbiDirectory::new(&settings.abi_dir),
        source.clone(),
        source,
        config,
    )
    .await?;

    if let Some((from, to)) = settings.sync {
        monitor.start_sync(from, to).await?;
        monitor.watch_sync().await;
        if let Some(outcome) = monitor.wait_sync().await {
            let summaries = outcome?;
            let entries: u64 = summaries.iter().map(|s| s.entries).sum();
            info!(targets = summaries.len(), entries, "Backfill finished");
        }
    }

    monitor.start_monitor().await;
    info!("Following chain head, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    monitor.shutdown().await;
    for event in monitor.events_sorted() {
        println!("{}", event.to_json());
    }
    info!(stats = ?monitor.handler_stats(), "Done");

    Ok(())
}
