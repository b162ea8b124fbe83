// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for eventmonitor integration tests
//!
//! Provides scripted implementations of the source traits so the monitor can
//! be exercised without a node.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use alloy_primitives::{address, keccak256, Address, BlockNumber, TxHash, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use eventmonitor::{
    EventMonitor, FilterHandle, FilterSpec, LogSource, MonitorConfig, RawLogEntry, Receipt,
    ReceiptSource, RpcError, StaticAbiSource,
};

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Token contract used across tests
pub const TOKEN: Address = address!("1111111111111111111111111111111111111111");
/// Sender in generated transfers
pub const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
/// Recipient in generated transfers
pub const BOB: Address = address!("0000000000000000000000000000000000000b0b");

/// ABI of a contract with a single `Transfer` event.
pub fn transfer_abi() -> String {
    r#"[{"type":"event","name":"Transfer","anonymous":false,"inputs":[
        {"name":"from","type":"address","indexed":true},
        {"name":"to","type":"address","indexed":true},
        {"name":"value","type":"uint256","indexed":false}]}]"#
        .to_string()
}

/// Topic hash of `Transfer(address,address,uint256)`.
pub fn transfer_topic() -> B256 {
    Transfer::SIGNATURE_HASH
}

/// Deterministic transaction hash for test number `n`.
pub fn tx_hash(n: u64) -> TxHash {
    keccak256(n.to_be_bytes())
}

/// A `Transfer` log of `value` from ALICE to BOB.
pub fn transfer_entry(
    contract: Address,
    block_number: BlockNumber,
    log_index: u64,
    transaction_hash: TxHash,
    value: u64,
) -> RawLogEntry {
    let data = Transfer {
        from: ALICE,
        to: BOB,
        value: U256::from(value),
    }
    .encode_log_data();

    RawLogEntry {
        address: contract,
        topics: data.topics().to_vec(),
        data: data.data,
        block_number,
        log_index,
        transaction_hash,
        transaction_index: 0,
        block_hash: keccak256(block_number.to_be_bytes()),
    }
}

/// `per_block` transfers in every block of `[from, to]`, one transaction each.
pub fn transfer_history(
    contract: Address,
    from: BlockNumber,
    to: BlockNumber,
    per_block: u64,
) -> Vec<RawLogEntry> {
    let mut logs = Vec::new();
    for block in from..=to {
        for i in 0..per_block {
            let n = block * 1_000 + i;
            logs.push(transfer_entry(contract, block, i, tx_hash(n), n));
        }
    }
    logs
}

#[derive(Default)]
struct MockState {
    logs: Vec<RawLogEntry>,
    opened: Vec<FilterSpec>,
    range_faults: usize,
    max_results: Option<usize>,
    fixed_batch: Option<usize>,
    transient_failures: usize,
    lost_filters: usize,
    head: BlockNumber,
    latency: Option<Duration>,
}

/// Scripted log source.
///
/// Historical queries return the stored logs inside the filter's range, after
/// any scripted range faults or transient failures. Result sets larger than
/// `max_results` are refused as range faults, like hosted providers do.
///
/// Live filters behave like `eth_getFilterChanges`: each keeps a cursor into
/// the log list, starting at the logs present when it was installed, and a
/// poll returns the matching logs appended since the previous poll.
#[derive(Clone, Default)]
pub struct MockLogSource {
    state: Arc<Mutex<MockState>>,
}

impl MockLogSource {
    /// A source serving `logs`.
    pub fn new(logs: Vec<RawLogEntry>) -> Self {
        let head = logs.iter().map(|log| log.block_number).max().unwrap_or(0);
        Self {
            state: Arc::new(Mutex::new(MockState {
                logs,
                head,
                ..Default::default()
            })),
        }
    }

    /// Fail the next `n` historical queries with a range fault.
    pub fn with_range_faults(self, n: usize) -> Self {
        self.state.lock().unwrap().range_faults = n;
        self
    }

    /// Refuse historical queries with more than `cap` results.
    pub fn with_max_results(self, cap: usize) -> Self {
        self.state.lock().unwrap().max_results = Some(cap);
        self
    }

    /// Answer every historical query with exactly `n` synthetic entries.
    pub fn with_fixed_batch(self, n: usize) -> Self {
        self.state.lock().unwrap().fixed_batch = Some(n);
        self
    }

    /// Fail the next `n` historical queries with a transport error.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.state.lock().unwrap().transient_failures = n;
        self
    }

    /// Answer the next `n` live polls as if the node forgot the filter.
    pub fn with_lost_filters(self, n: usize) -> Self {
        self.state.lock().unwrap().lost_filters = n;
        self
    }

    /// Delay every historical query by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().latency = Some(latency);
        self
    }

    /// Chain head reported by `latest_block`.
    pub fn with_head(self, head: BlockNumber) -> Self {
        self.state.lock().unwrap().head = head;
        self
    }

    /// Append newly mined logs, moving the head along.
    pub fn append_logs(&self, logs: impl IntoIterator<Item = RawLogEntry>) {
        let mut state = self.state.lock().unwrap();
        for log in logs {
            state.head = state.head.max(log.block_number);
            state.logs.push(log);
        }
    }

    /// Live filters opened so far, reinstalls included.
    pub fn live_installs(&self) -> usize {
        self.opened()
            .iter()
            .filter(|spec| spec.block_range().is_none())
            .count()
    }

    /// Every spec a filter was opened with, in order.
    pub fn opened(&self) -> Vec<FilterSpec> {
        self.state.lock().unwrap().opened.clone()
    }

    /// Block ranges of the historical filters opened, in order.
    pub fn opened_ranges(&self) -> Vec<(BlockNumber, BlockNumber)> {
        self.opened()
            .iter()
            .filter_map(FilterSpec::block_range)
            .collect()
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn open_filter(&self, spec: &FilterSpec) -> Result<Box<dyn FilterHandle>, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.opened.push(spec.clone());
        Ok(Box::new(MockFilter {
            spec: spec.clone(),
            cursor: AtomicUsize::new(state.logs.len()),
            state: self.state.clone(),
        }))
    }

    async fn latest_block(&self) -> Result<BlockNumber, RpcError> {
        Ok(self.state.lock().unwrap().head)
    }
}

struct MockFilter {
    spec: FilterSpec,
    cursor: AtomicUsize,
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, thiserror::Error)]
#[error("connection reset")]
struct ConnectionReset;

#[async_trait]
impl FilterHandle for MockFilter {
    fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    async fn all_entries(&self) -> Result<Vec<RawLogEntry>, RpcError> {
        let latency = self.state.lock().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap();
        let (from, to) = self.spec.block_range().expect("historical filter");

        if state.range_faults > 0 {
            state.range_faults -= 1;
            return Err(RpcError::range_too_large(from, to, "scripted fault"));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(RpcError::get_logs_failed(self.spec.to_string(), ConnectionReset));
        }
        if let Some(n) = state.fixed_batch {
            let contract = self.spec.address();
            return Ok((0..n as u64)
                .map(|i| transfer_entry(contract, from, i, tx_hash(from * 100_000 + i), i))
                .collect());
        }

        let entries: Vec<RawLogEntry> = state
            .logs
            .iter()
            .filter(|log| {
                self.spec.matches(log.address, log.topic0())
                    && self.spec.contains_block(log.block_number)
            })
            .cloned()
            .collect();

        if state.max_results.is_some_and(|cap| entries.len() > cap) {
            return Err(RpcError::range_too_large(
                from,
                to,
                format!("query returned more than {} results", entries.len()),
            ));
        }
        Ok(entries)
    }

    async fn new_entries(&self) -> Result<Vec<RawLogEntry>, RpcError> {
        let mut state = self.state.lock().unwrap();
        if state.lost_filters > 0 {
            state.lost_filters -= 1;
            return Err(RpcError::filter_not_found(self.spec.to_string(), "filter not found"));
        }

        let cursor = self.cursor.swap(state.logs.len(), Ordering::SeqCst);
        Ok(state.logs[cursor..]
            .iter()
            .filter(|log| self.spec.matches(log.address, log.topic0()))
            .cloned()
            .collect())
    }
}

/// Receipt source built from known logs, grouped by transaction.
#[derive(Default)]
pub struct MockReceiptSource {
    receipts: HashMap<TxHash, Receipt>,
    failures: Mutex<u32>,
}

impl MockReceiptSource {
    /// Receipts holding `logs`.
    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a RawLogEntry>) -> Self {
        let mut receipts: HashMap<TxHash, Receipt> = HashMap::new();
        for log in logs {
            receipts
                .entry(log.transaction_hash)
                .or_insert_with(|| Receipt {
                    transaction_hash: log.transaction_hash,
                    logs: Vec::new(),
                })
                .logs
                .push(log.clone());
        }
        Self {
            receipts,
            failures: Mutex::new(0),
        }
    }

    /// Fail the next `n` lookups.
    pub fn with_failures(self, n: u32) -> Self {
        *self.failures.lock().unwrap() = n;
        self
    }
}

#[async_trait]
impl ReceiptSource for MockReceiptSource {
    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Receipt, RpcError> {
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(RpcError::get_receipt_failed(tx_hash, ConnectionReset));
            }
        }
        self.receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(RpcError::ReceiptNotFound { tx_hash })
    }
}

/// Config with short intervals for tests.
pub fn test_config() -> MonitorConfig {
    MonitorConfig::minimal()
}

/// A monitor over TOKEN backed by the given mocks.
pub async fn token_monitor(
    logs: MockLogSource,
    receipts: MockReceiptSource,
    event_names: Option<Vec<String>>,
    config: MonitorConfig,
) -> EventMonitor {
    let abis = StaticAbiSource::new().with_abi(TOKEN, transfer_abi());
    EventMonitor::new(
        &[TOKEN.to_string()],
        event_names,
        &abis,
        Arc::new(logs),
        Arc::new(receipts),
        config,
    )
    .await
    .expect("monitor builds")
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
