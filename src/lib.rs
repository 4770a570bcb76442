//! # Rebound
//!
//! Bounded retries for fallible async operations: exponential backoff,
//! optional jitter, error classification and shared statistics.
//!
//! ## Quick Example
//!
//! ```rust
//! use rebound::{PolicyOverrides, Retrier, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let retrier = Retrier::new(RetryPolicy::default()).unwrap();
//!
//! // Tighter budget for this one call; the base policy is unchanged.
//! let overrides = PolicyOverrides::new()
//!     .max_attempts(2)
//!     .base_delay(Duration::from_millis(1));
//!
//! let outcome = retrier
//!     .execute_with(|| async { Ok::<_, String>(42) }, &overrides)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(outcome.value, 42);
//! assert_eq!(outcome.attempts_used, 1);
//! assert_eq!(retrier.stats().success_rate, 1.0);
//! # });
//! ```
//!
//! ## Features
//!
//! - `serde` (default): `Serialize`/`Deserialize` for policies, overrides,
//!   statistics snapshots and [`RetrySummary`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod retry;

// Re-exports
pub use retry::{
    Classifier, Exhausted, NonRetryable, OperationError, Outcome, PolicyError, PolicyOverrides,
    Retrier, RetryError, RetryEvent, RetryPolicy, RetryStats, RetrySummary, RetryableError,
    StatsSnapshot,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{
        OperationError, Outcome, PolicyOverrides, Retrier, RetryError, RetryPolicy,
        RetryableError,
    };
}
