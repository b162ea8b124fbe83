//! Default tuning constants
//!
//! This module centralizes the magic numbers of the monitor loops so the
//! defaults of [`MonitorConfig`](super::MonitorConfig) are discoverable in one
//! place.

use std::time::Duration;

/// Target number of log entries per historical query.
///
/// The range scanner grows or shrinks its increment so that the average
/// batch size converges to this value.
pub const DEFAULT_DENSITY_TARGET: usize = 5_000;

/// Number of recent batch sizes averaged before the increment is tuned.
pub const DEFAULT_SAMPLE_WINDOW: usize = 10;

/// The initial increment is `(end - start) / DEFAULT_INITIAL_DIVISOR`.
///
/// Starting at 1% of the range keeps the first queries cheap on contracts
/// whose early blocks are sparse.
pub const DEFAULT_INITIAL_DIVISOR: u64 = 100;

/// Smallest increment the scanner will ever use.
pub const DEFAULT_MIN_INCREMENT: u64 = 1;

/// Consecutive range faults tolerated at the minimum increment.
pub const DEFAULT_MAX_FLOOR_FAULTS: u32 = 5;

/// Interval between live filter polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Interval between sync status lines printed by `watch_sync`.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(10);

/// Capacity of the bounded event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_defaults() {
        assert_eq!(DEFAULT_DENSITY_TARGET, 5_000);
        assert_eq!(DEFAULT_SAMPLE_WINDOW, 10);
        assert_eq!(DEFAULT_INITIAL_DIVISOR, 100);
    }

    #[test]
    fn test_min_increment_is_positive() {
        assert!(DEFAULT_MIN_INCREMENT >= 1);
    }
}
