//! Interval progress logging shared by the worker threads of a command.
//!
//! Commands hand one [`ProgressTracker`] to every rayon worker. Each processed group or
//! consensus bumps an atomic counter; whichever worker pushes the counter across a multiple of
//! the interval logs that milestone with the throughput so far.

use crate::logging::{format_duration, format_rate};
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const DEFAULT_INTERVAL: u64 = 10_000;

/// Thread-safe counter that logs every `interval` items.
///
/// ```
/// use fgmig_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Corrected consensuses").with_interval(100);
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Corrected consensuses 250 (complete in 0s)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    label: String,
    interval: u64,
    count: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    /// A tracker logging every 10,000 items.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interval: DEFAULT_INTERVAL,
            count: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Sets the logging interval. Zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` items, logging every milestone crossed on the way.
    ///
    /// Returns whether the count now sits exactly on a milestone, in which case that milestone
    /// has already been logged.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        let before = self.count.fetch_add(additional, Ordering::Relaxed);
        let after = before + additional;

        let elapsed = self.started.elapsed();
        for milestone in (before / self.interval + 1..=after / self.interval).map(|i| i * self.interval) {
            info!("{} {} ({})", self.label, milestone, format_rate(milestone, elapsed));
        }
        after > 0 && after.is_multiple_of(self.interval)
    }

    /// Logs the final count unless it was just logged as a milestone.
    pub fn log_final(&self) {
        let count = self.count();
        if count > 0 && !count.is_multiple_of(self.interval) {
            info!("{} {} (complete in {})", self.label, count, format_duration(self.started.elapsed()));
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
