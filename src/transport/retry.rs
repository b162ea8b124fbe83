// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Bounded exponential backoff for RPC calls.
//!
//! [`RetryConfig`] is the retry budget shared by the monitor loops: the
//! handler uses it for receipt lookups, the range scanner for transport
//! failures that are not range faults. [`RetryLayer`] applies the same policy
//! below the alloy client so every request of an RPC-backed source gets it.
//!
//! Range faults ("query returned more than N results", "block range too
//! large") are never retried here. Retrying them unchanged fails again; the
//! range scanner has to see them and shrink its batch.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use alloy_json_rpc::{ErrorPayload, RequestPacket, ResponsePacket, RpcError};
use alloy_transport::TransportError;
use tower::Layer;
use tracing::{debug, warn};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 100;
/// Ceiling of a single backoff sleep
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// JSON-RPC error code most providers use for "limit exceeded".
const LIMIT_EXCEEDED_CODE: i64 = -32005;

/// Message fragments providers use when a log query is too large.
const RANGE_FAULT_HINTS: &[&str] = &[
    "query returned more than",
    "block range too large",
    "block range is too wide",
    "block range exceeds",
    "exceeds max block range",
    "range too large",
    "too many results",
    "response size exceeded",
    "log response size",
    "exceed maximum",
];

/// Retry budget with exponential backoff.
///
/// The delay before retry `n` (zero-based) is `min(base_delay * 2^n, max_delay)`.
///
/// # Example
///
/// ```rust
/// use eventmonitor::transport::RetryConfig;
/// use std::time::Duration;
///
/// let retry = RetryConfig::default();
/// assert_eq!(retry.backoff(0), Duration::from_millis(100));
/// assert_eq!(retry.backoff(2), Duration::from_millis(400));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each later one
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// A budget that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// A Tower layer that retries transient RPC failures with exponential backoff.
///
/// # Example
///
/// ```rust,ignore
/// use eventmonitor::transport::{RetryConfig, RetryLayer};
/// use alloy_rpc_client::ClientBuilder;
///
/// let client = ClientBuilder::default()
///     .layer(RetryLayer::new(RetryConfig::default()))
///     .http(rpc_url);
/// ```
#[derive(Clone, Debug)]
pub struct RetryLayer {
    config: Arc<RetryConfig>,
}

impl RetryLayer {
    /// Creates a retry layer with the given budget.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for RetryLayer {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RetryService {
            service,
            config: self.config.clone(),
        }
    }
}

/// Service produced by [`RetryLayer`].
#[derive(Clone, Debug)]
pub struct RetryService<S> {
    service: S,
    config: Arc<RetryConfig>,
}

impl<S> tower::Service<RequestPacket> for RetryService<S>
where
    S: tower::Service<RequestPacket, Response = ResponsePacket, Error = TransportError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: RequestPacket) -> Self::Future {
        Box::pin(send_with_retry(
            self.service.clone(),
            self.config.clone(),
            request,
        ))
    }
}

async fn send_with_retry<S>(
    service: S,
    config: Arc<RetryConfig>,
    request: RequestPacket,
) -> Result<ResponsePacket, TransportError>
where
    S: tower::Service<RequestPacket, Response = ResponsePacket, Error = TransportError> + Clone,
{
    let mut retries = 0u32;
    loop {
        let error = match service.clone().call(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        match disposition(&error) {
            Disposition::RangeFault => {
                debug!(error = %error, "Range fault, handing back to the scanner");
                return Err(error);
            }
            Disposition::Fatal => return Err(error),
            Disposition::Transient if retries >= config.max_retries => {
                warn!(error = %error, retries, "RPC request failed, retry budget spent");
                return Err(error);
            }
            Disposition::Transient => {
                let delay = config.backoff(retries);
                retries += 1;
                debug!(
                    error = %error,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Transient RPC failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// What the retry layer does with a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Try again after a backoff
    Transient,
    /// The query covered too much; only a smaller range can succeed
    RangeFault,
    /// Retrying cannot help
    Fatal,
}

fn disposition(error: &TransportError) -> Disposition {
    match error {
        RpcError::ErrorResp(payload) if is_range_fault_payload(payload) => Disposition::RangeFault,
        RpcError::ErrorResp(payload) if payload.is_retry_err() => Disposition::Transient,
        RpcError::Transport(kind) if kind.is_retry_err() => Disposition::Transient,
        RpcError::NullResp | RpcError::DeserError { .. } => Disposition::Transient,
        _ => Disposition::Fatal,
    }
}

/// Whether a JSON-RPC error says the log query covered too much.
///
/// Providers disagree on codes and wording, so this matches the common
/// "limit exceeded" code and a set of message fragments.
pub fn is_range_fault(error: &TransportError) -> bool {
    disposition(error) == Disposition::RangeFault
}

/// Whether a JSON-RPC error says the node does not know the polled filter.
///
/// Geth and Erigon answer "filter not found"; Nethermind says the filter
/// "does not exist".
pub fn is_filter_lost(error: &TransportError) -> bool {
    let RpcError::ErrorResp(payload) = error else {
        return false;
    };
    let message = payload.message.to_lowercase();
    message.contains("filter")
        && (message.contains("not found") || message.contains("does not exist"))
}

fn is_range_fault_payload<E>(payload: &ErrorPayload<E>) -> bool {
    let message = payload.message.to_lowercase();
    let hinted = RANGE_FAULT_HINTS.iter().any(|hint| message.contains(hint));
    hinted || (payload.code == LIMIT_EXCEEDED_CODE && !message.contains("rate"))
}
