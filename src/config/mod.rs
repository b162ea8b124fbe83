//! Configuration for eventmonitor operations
//!
//! This module provides the knobs of the three monitor loops: live polling
//! cadence, queue capacity, the range scanner's adaptive batch sizing, and
//! the retry budgets for transport failures.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use eventmonitor::MonitorConfig;
//!
//! // 2s polling, 10k queue, 5000-entry density target
//! let config = MonitorConfig::default();
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use eventmonitor::MonitorConfigBuilder;
//! use std::time::Duration;
//!
//! let config = MonitorConfigBuilder::new()
//!     .poll_interval(Duration::from_millis(500))
//!     .density_target(2_000)
//!     .initial_increment(1_000)
//!     .build();
//! ```

use std::time::Duration;

use crate::transport::RetryConfig;

pub mod constants;

use constants::{
    DEFAULT_DENSITY_TARGET, DEFAULT_INITIAL_DIVISOR, DEFAULT_MAX_FLOOR_FAULTS,
    DEFAULT_MIN_INCREMENT, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_SAMPLE_WINDOW,
    DEFAULT_WATCH_INTERVAL,
};

/// Configuration for an [`EventMonitor`](crate::EventMonitor)
///
/// Use [`MonitorConfigBuilder`] for a fluent API to construct instances.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between polls of the live filters
    /// Default: 2 seconds
    pub poll_interval: Duration,

    /// Interval between status lines printed by `watch_sync`
    /// Default: 10 seconds
    pub watch_interval: Duration,

    /// Maximum number of raw entries buffered between producers and the handler
    ///
    /// Producers block once the queue is full.
    /// Default: 10,000
    pub queue_capacity: usize,

    /// Adaptive batch sizing for historical scans
    pub scan: ScanSettings,

    /// Retry budget for receipt lookups in the handler
    pub receipt_retry: RetryConfig,

    /// Retry budget for non-range failures during historical scans
    pub scan_retry: RetryConfig,
}

/// Adaptive batch sizing of the range scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// Desired entries per historical query
    pub density_target: usize,

    /// Number of recent batch sizes averaged before the increment changes
    pub sample_window: usize,

    /// The initial increment is `(end - start) / initial_divisor`
    pub initial_divisor: u64,

    /// Explicit initial increment, overriding `initial_divisor`
    pub initial_increment: Option<u64>,

    /// Floor of the increment; halving and tuning never go below it
    pub min_increment: u64,

    /// Consecutive range faults tolerated at `min_increment` before the scan fails
    pub max_floor_faults: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            density_target: DEFAULT_DENSITY_TARGET,
            sample_window: DEFAULT_SAMPLE_WINDOW,
            initial_divisor: DEFAULT_INITIAL_DIVISOR,
            initial_increment: None,
            min_increment: DEFAULT_MIN_INCREMENT,
            max_floor_faults: DEFAULT_MAX_FLOOR_FAULTS,
        }
    }
}

impl ScanSettings {
    /// Increment the scanner starts with for `[start, end]`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use eventmonitor::ScanSettings;
    ///
    /// let settings = ScanSettings::default();
    /// assert_eq!(settings.initial_increment_for(0, 1_000_000), 10_000);
    /// // Tiny ranges never start at zero
    /// assert_eq!(settings.initial_increment_for(0, 50), 1);
    /// ```
    pub fn initial_increment_for(&self, start: u64, end: u64) -> u64 {
        let derived = match self.initial_increment {
            Some(increment) => increment,
            None => end.saturating_sub(start) / self.initial_divisor.max(1),
        };
        derived.max(self.min_increment.max(1))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            watch_interval: DEFAULT_WATCH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scan: ScanSettings::default(),
            receipt_retry: RetryConfig::default(),
            scan_retry: RetryConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Create a config with short intervals and no retry delays
    ///
    /// Suitable for tests and local nodes.
    ///
    /// # Example
    ///
    /// ```rust
    /// use eventmonitor::MonitorConfig;
    /// use std::time::Duration;
    ///
    /// let config = MonitorConfig::minimal();
    /// assert_eq!(config.poll_interval, Duration::from_millis(10));
    /// ```
    pub fn minimal() -> Self {
        let quick_retry = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        Self {
            poll_interval: Duration::from_millis(10),
            watch_interval: Duration::from_millis(10),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scan: ScanSettings::default(),
            receipt_retry: quick_retry.clone(),
            scan_retry: quick_retry,
        }
    }
}

/// Builder for [`MonitorConfig`]
///
/// # Example
///
/// ```rust
/// use eventmonitor::MonitorConfigBuilder;
/// use std::time::Duration;
///
/// let config = MonitorConfigBuilder::new()
///     .queue_capacity(500)
///     .min_increment(10)
///     .build();
///
/// assert_eq!(config.queue_capacity, 500);
/// assert_eq!(config.scan.min_increment, 10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Start from [`MonitorConfig::default`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from [`MonitorConfig::minimal`]
    pub fn minimal() -> Self {
        Self {
            config: MonitorConfig::minimal(),
        }
    }

    /// Set the live polling interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the `watch_sync` printing interval
    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.config.watch_interval = interval;
        self
    }

    /// Set the event queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    /// Set the desired entries per historical query
    pub fn density_target(mut self, target: usize) -> Self {
        self.config.scan.density_target = target.max(1);
        self
    }

    /// Set how many batch sizes are averaged before tuning (at least 1)
    pub fn sample_window(mut self, window: usize) -> Self {
        self.config.scan.sample_window = window.max(1);
        self
    }

    /// Start every scan with this increment instead of a fraction of the range
    pub fn initial_increment(mut self, increment: u64) -> Self {
        self.config.scan.initial_increment = Some(increment);
        self
    }

    /// Set the increment floor (at least 1)
    pub fn min_increment(mut self, increment: u64) -> Self {
        self.config.scan.min_increment = increment.max(1);
        self
    }

    /// Set how many range faults at the floor end a scan
    pub fn max_floor_faults(mut self, faults: u32) -> Self {
        self.config.scan.max_floor_faults = faults;
        self
    }

    /// Set the receipt lookup retry budget
    pub fn receipt_retry(mut self, retry: RetryConfig) -> Self {
        self.config.receipt_retry = retry;
        self
    }

    /// Set the historical scan retry budget
    pub fn scan_retry(mut self, retry: RetryConfig) -> Self {
        self.config.scan_retry = retry;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> MonitorConfig {
        self.config
    }
}
