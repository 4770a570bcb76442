//! Aggregate retry statistics shared by every call on a [`Retrier`](crate::Retrier).

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_operations: u64,
    total_retries: u64,
    successful_operations: u64,
    failed_operations: u64,
}

/// Live counters, updated once when a call starts and once when it ends.
///
/// All counters sit behind a single lock so a snapshot never sees a
/// half-applied update.
#[derive(Debug, Default)]
pub struct RetryStats {
    counters: Mutex<Counters>,
}

impl RetryStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Each update is a plain increment, so a poisoned lock still holds valid counts.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a call that is about to make its first attempt.
    pub fn record_start(&self) {
        self.lock().total_operations += 1;
    }

    /// Count a call that succeeded after `retries` retries.
    pub fn record_success(&self, retries: u32) {
        let mut c = self.lock();
        c.successful_operations += 1;
        c.total_retries += u64::from(retries);
    }

    /// Count a call that gave up after `retries` retries.
    pub fn record_failure(&self, retries: u32) {
        let mut c = self.lock();
        c.failed_operations += 1;
        c.total_retries += u64::from(retries);
    }

    /// Read the counters as they are right now.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::from_counters(*self.lock())
    }
}

/// Point-in-time view of [`RetryStats`].
///
/// ```rust
/// use rebound::Retrier;
///
/// let stats = Retrier::default().stats();
///
/// assert_eq!(stats.total_operations, 0);
/// assert_eq!(stats.success_rate, 0.0);
/// assert_eq!(stats.average_attempts_per_operation, 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsSnapshot {
    /// Calls started.
    pub total_operations: u64,
    /// Retries made across all finished calls.
    pub total_retries: u64,
    /// Calls that returned a value.
    pub successful_operations: u64,
    /// Calls that gave up.
    pub failed_operations: u64,
    /// `successful_operations / total_operations`, or 0 before any call.
    pub success_rate: f64,
    /// `(total_operations + total_retries) / total_operations`, or 0 before any call.
    pub average_attempts_per_operation: f64,
}

impl StatsSnapshot {
    fn from_counters(c: Counters) -> Self {
        let (success_rate, average_attempts_per_operation) = if c.total_operations == 0 {
            (0.0, 0.0)
        } else {
            let total = c.total_operations as f64;
            (
                c.successful_operations as f64 / total,
                (c.total_operations + c.total_retries) as f64 / total,
            )
        };

        Self {
            total_operations: c.total_operations,
            total_retries: c.total_retries,
            successful_operations: c.successful_operations,
            failed_operations: c.failed_operations,
            success_rate,
            average_attempts_per_operation,
        }
    }

    /// Calls started but not yet finished when the snapshot was taken.
    pub fn in_flight(&self) -> u64 {
        self.total_operations
            .saturating_sub(self.successful_operations + self.failed_operations)
    }
}
