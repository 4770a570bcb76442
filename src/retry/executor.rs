//! The retry executor.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::classify::RetryableError;
use super::error::{Exhausted, NonRetryable, RetryError};
use super::policy::{PolicyError, PolicyOverrides, RetryPolicy};
use super::stats::{RetryStats, StatsSnapshot};

/// Runs fallible async operations under a [`RetryPolicy`].
///
/// A `Retrier` owns its base policy and a set of statistics counters. Clones
/// are cheap handles onto the same counters, so one retrier can be shared
/// across tasks and its [`stats`](Self::stats) aggregate every call.
///
/// # Examples
///
/// ```rust
/// use rebound::{Retrier, RetryPolicy};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let retrier = Retrier::new(
///     RetryPolicy::default().with_base_delay(Duration::from_millis(1)),
/// )
/// .unwrap();
///
/// let calls = &AtomicU32::new(0);
/// let outcome = retrier
///     .execute(move || async move {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err("503 service unavailable")
///         } else {
///             Ok("payload")
///         }
///     })
///     .await
///     .unwrap();
///
/// assert_eq!(outcome.value, "payload");
/// assert_eq!(outcome.attempts_used, 3);
/// assert_eq!(outcome.errors_seen.len(), 2);
/// assert_eq!(retrier.stats().total_retries, 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Retrier {
    id: Uuid,
    policy: Arc<RetryPolicy>,
    stats: Arc<RetryStats>,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::from_valid(RetryPolicy::default())
    }
}

impl Retrier {
    /// Create a retrier, rejecting policies that break the policy invariants.
    pub fn new(policy: RetryPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self::from_valid(policy))
    }

    fn from_valid(policy: RetryPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy: Arc::new(policy),
            stats: Arc::new(RetryStats::new()),
        }
    }

    /// Identifier of this retrier, shared by its clones.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The base policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of the shared statistics, read now.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Check an error against the base policy's classifier.
    pub fn is_retryable<E: RetryableError + ?Sized>(&self, error: &E) -> bool {
        self.policy.classifier().is_retryable(error)
    }

    /// Export identity, statistics and retryable codes for logging.
    pub fn summary(&self) -> RetrySummary {
        RetrySummary {
            id: self.id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            stats: self.stats(),
            retryable_error_codes: self.policy.retryable_error_codes().iter().cloned().collect(),
        }
    }

    /// Run `operation` under the base policy.
    ///
    /// The operation is a factory: each attempt calls it again to get a fresh
    /// future.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: F,
    ) -> Result<Outcome<T, E>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        self.execute_with_hooks(operation, &PolicyOverrides::new(), |_| {}).await
    }

    /// Run `operation` under the base policy with `overrides` applied for
    /// this call only.
    pub async fn execute_with<T, E, F, Fut>(
        &self,
        operation: F,
        overrides: &PolicyOverrides,
    ) -> Result<Outcome<T, E>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        self.execute_with_hooks(operation, overrides, |_| {}).await
    }

    /// Run `operation`, calling `on_retry` before each backoff sleep.
    ///
    /// The hook is synchronous and should not block; use it for logging or
    /// metrics.
    ///
    /// ```rust
    /// use rebound::{PolicyOverrides, Retrier, RetryEvent};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let retrier = Retrier::default();
    /// let overrides = PolicyOverrides::new()
    ///     .base_delay(Duration::from_millis(1))
    ///     .jitter(false);
    ///
    /// let mut delays = Vec::new();
    /// let result = retrier
    ///     .execute_with_hooks(
    ///         || async { Err::<(), _>("network down") },
    ///         &overrides,
    ///         |event: &RetryEvent<'_, &str>| delays.push(event.next_delay),
    ///     )
    ///     .await;
    ///
    /// assert!(result.unwrap_err().is_exhausted());
    /// assert_eq!(delays, vec![Duration::from_millis(1), Duration::from_millis(2)]);
    /// # });
    /// ```
    pub async fn execute_with_hooks<T, E, F, Fut, H>(
        &self,
        operation: F,
        overrides: &PolicyOverrides,
        on_retry: H,
    ) -> Result<Outcome<T, E>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
        H: FnMut(&RetryEvent<'_, E>),
    {
        let policy = self.policy.merged(overrides);
        let span = tracing::debug_span!(
            "retry",
            id = %self.id,
            max_attempts = policy.max_attempts()
        );
        self.run(operation, &policy, on_retry).instrument(span).await
    }

    async fn run<T, E, F, Fut, H>(
        &self,
        mut operation: F,
        policy: &RetryPolicy,
        mut on_retry: H,
    ) -> Result<Outcome<T, E>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
        H: FnMut(&RetryEvent<'_, E>),
    {
        let classifier = policy.classifier();
        let start = Instant::now();
        let mut errors_seen = Vec::new();
        let mut attempt = 1u32;

        self.stats.record_start();

        loop {
            let error = match operation().await {
                Ok(value) => {
                    self.stats.record_success(attempt - 1);
                    if attempt > 1 {
                        tracing::trace!(attempt, "operation succeeded after retrying");
                    }
                    return Ok(Outcome {
                        value,
                        attempts_used: attempt,
                        elapsed: start.elapsed(),
                        errors_seen,
                        completed_at: SystemTime::now(),
                    });
                }
                Err(error) => error,
            };

            if attempt >= policy.max_attempts() {
                self.stats.record_failure(attempt - 1);
                tracing::warn!(attempt, error = %error, "retry attempts exhausted");
                return Err(RetryError::Exhausted(Exhausted::new(
                    error,
                    errors_seen,
                    attempt,
                    start.elapsed(),
                )));
            }

            if !classifier.is_retryable(&error) {
                self.stats.record_failure(attempt - 1);
                tracing::warn!(attempt, error = %error, "non-retryable error, giving up");
                return Err(RetryError::NonRetryable(NonRetryable::new(
                    error,
                    errors_seen,
                    attempt,
                    start.elapsed(),
                )));
            }

            let delay = policy.delay_for_attempt(attempt);
            tracing::debug!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "attempt failed, retrying"
            );
            on_retry(&RetryEvent {
                attempt,
                error: &error,
                next_delay: delay,
                elapsed: start.elapsed(),
            });
            errors_seen.push(error);

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// A successful retry sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T, E> {
    /// The operation's return value.
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts_used: u32,
    /// Time from the first attempt to success.
    pub elapsed: Duration,
    /// Failures before the success, oldest first.
    pub errors_seen: Vec<E>,
    /// When the call finished.
    pub completed_at: SystemTime,
}

impl<T, E> Outcome<T, E> {
    /// Always true. Failed sequences are reported as [`RetryError`] instead.
    pub fn succeeded(&self) -> bool {
        true
    }

    /// Retries made before success.
    pub fn retries(&self) -> u32 {
        self.attempts_used.saturating_sub(1)
    }

    /// Extract the value, discarding metadata.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Information about a failed attempt that is about to be retried.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// Serializable export of a [`Retrier`]'s state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetrySummary {
    /// Retrier identifier.
    pub id: Uuid,
    /// Crate version that produced the summary.
    pub version: String,
    /// When the summary was taken.
    pub timestamp: DateTime<Utc>,
    /// Statistics at that moment.
    pub stats: StatsSnapshot,
    /// The base policy's retryable codes, sorted.
    pub retryable_error_codes: Vec<String>,
}
