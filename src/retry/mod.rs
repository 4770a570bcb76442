//! Bounded retries for async operations.
//!
//! This module follows a "pure core, imperative shell" split:
//!
//! - **Pure Core**: [`RetryPolicy`], the [`Classifier`] and the delay
//!   functions are plain data and pure functions, testable without a runtime
//! - **Shell**: [`Retrier`] drives the attempt loop, sleeps between attempts
//!   and records [`StatsSnapshot`] counters
//!
//! # Quick Start
//!
//! ```rust
//! use rebound::{OperationError, Retrier, RetryError, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let retrier = Retrier::new(
//!     RetryPolicy::default()
//!         .with_max_attempts(4)
//!         .with_base_delay(Duration::from_millis(1)),
//! )
//! .unwrap();
//!
//! // Authentication failures are not transient: one attempt, then give up.
//! let result = retrier
//!     .execute(|| async {
//!         Err::<(), _>(OperationError::new("Invalid authentication credentials"))
//!     })
//!     .await;
//!
//! match result {
//!     Err(RetryError::NonRetryable(err)) => assert_eq!(err.attempts, 1),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! assert_eq!(retrier.stats().failed_operations, 1);
//! # });
//! ```
//!
//! # Backoff
//!
//! The delay after attempt `n` is `base_delay * backoff_multiplier^(n-1)`,
//! capped at `max_delay`. With jitter enabled the capped value is perturbed
//! by up to ±5%.
//!
//! # Error Types
//!
//! - [`RetryError::Exhausted`]: every attempt failed
//! - [`RetryError::NonRetryable`]: the classifier rejected an error early

mod classify;
mod delay;
mod error;
mod executor;
mod policy;
mod stats;

pub use classify::{
    Classifier, OperationError, RetryableError, DEFAULT_RETRYABLE_CODES,
    DEFAULT_RETRYABLE_KEYWORDS,
};
pub use delay::{apply_jitter, base_delay_ms, delay_for_attempt};
pub use error::{Exhausted, NonRetryable, RetryError};
pub use executor::{Outcome, Retrier, RetryEvent, RetrySummary};
pub use policy::{PolicyError, PolicyOverrides, RetryPolicy};
pub use stats::{RetryStats, StatsSnapshot};

#[cfg(test)]
mod tests;
