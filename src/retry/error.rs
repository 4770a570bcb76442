//! Terminal error types for retry operations.

use std::time::Duration;

/// Why a retried operation gave up.
///
/// Both variants carry the partial progress of the call: the attempt count,
/// the elapsed time and every error seen, in order.
///
/// # Examples
///
/// ```rust
/// use rebound::{RetryError, RetryPolicy, Retrier};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let retrier = Retrier::new(
///     RetryPolicy::default()
///         .with_max_attempts(2)
///         .with_base_delay(Duration::from_millis(1)),
/// )
/// .unwrap();
///
/// match retrier.execute(|| async { Err::<(), _>("connection refused") }).await {
///     Err(RetryError::Exhausted(exhausted)) => {
///         assert_eq!(exhausted.attempts, 2);
///         assert_eq!(exhausted.errors_seen().count(), 2);
///     }
///     other => panic!("expected exhaustion, got {:?}", other),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every permitted attempt failed.
    Exhausted(Exhausted<E>),
    /// The latest error was classified as not worth retrying.
    NonRetryable(NonRetryable<E>),
}

impl<E> RetryError<E> {
    /// Returns true if the attempt budget ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Returns true if a non-retryable error stopped the call.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, Self::NonRetryable(_))
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted(e) => e.attempts,
            Self::NonRetryable(e) => e.attempts,
        }
    }

    /// Time from the first attempt to giving up.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Exhausted(e) => e.elapsed,
            Self::NonRetryable(e) => e.elapsed,
        }
    }

    /// The error that ended the call.
    pub fn last_error(&self) -> &E {
        match self {
            Self::Exhausted(e) => &e.final_error,
            Self::NonRetryable(e) => &e.error,
        }
    }

    /// Every error seen, oldest first.
    pub fn errors_seen(&self) -> impl Iterator<Item = &E> {
        let (earlier, last) = match self {
            Self::Exhausted(e) => (&e.earlier_errors, &e.final_error),
            Self::NonRetryable(e) => (&e.earlier_errors, &e.error),
        };
        earlier.iter().chain(std::iter::once(last))
    }

    /// Extract the error that ended the call, discarding metadata.
    pub fn into_error(self) -> E {
        match self {
            Self::Exhausted(e) => e.final_error,
            Self::NonRetryable(e) => e.error,
        }
    }

    /// Extract every error seen, oldest first.
    pub fn into_errors(self) -> Vec<E> {
        match self {
            Self::Exhausted(e) => e.into_errors(),
            Self::NonRetryable(e) => e.into_errors(),
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted(e) => std::fmt::Display::fmt(e, f),
            Self::NonRetryable(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.last_error())
    }
}

/// Error returned when all attempts are used up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    /// The error from the final attempt.
    pub final_error: E,
    /// Errors from the attempts before the final one, oldest first.
    pub earlier_errors: Vec<E>,
    /// Total number of attempts made.
    pub attempts: u32,
    /// Total time spent retrying.
    pub elapsed: Duration,
}

impl<E> Exhausted<E> {
    /// Create a new Exhausted error.
    pub fn new(final_error: E, earlier_errors: Vec<E>, attempts: u32, elapsed: Duration) -> Self {
        Self {
            final_error,
            earlier_errors,
            attempts,
            elapsed,
        }
    }

    /// Every error seen, oldest first.
    pub fn errors_seen(&self) -> impl Iterator<Item = &E> {
        self.earlier_errors
            .iter()
            .chain(std::iter::once(&self.final_error))
    }

    /// Extract every error seen, oldest first.
    pub fn into_errors(mut self) -> Vec<E> {
        self.earlier_errors.push(self.final_error);
        self.earlier_errors
    }
}

impl<E: std::fmt::Display> std::fmt::Display for Exhausted<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempts ({:?}): {}",
            self.attempts, self.elapsed, self.final_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Exhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}

/// Error returned when a failure is not worth retrying.
///
/// No further attempts are made, even if the budget allows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonRetryable<E> {
    /// The error that was rejected by the classifier.
    pub error: E,
    /// Retryable errors from earlier attempts, oldest first.
    pub earlier_errors: Vec<E>,
    /// Attempt on which the error occurred.
    pub attempts: u32,
    /// Time from the first attempt to giving up.
    pub elapsed: Duration,
}

impl<E> NonRetryable<E> {
    /// Create a new NonRetryable error.
    pub fn new(error: E, earlier_errors: Vec<E>, attempts: u32, elapsed: Duration) -> Self {
        Self {
            error,
            earlier_errors,
            attempts,
            elapsed,
        }
    }

    /// Extract the triggering error, discarding metadata.
    pub fn into_error(self) -> E {
        self.error
    }

    /// Extract every error seen, oldest first.
    pub fn into_errors(mut self) -> Vec<E> {
        self.earlier_errors.push(self.error);
        self.earlier_errors
    }
}

impl<E: std::fmt::Display> std::fmt::Display for NonRetryable<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "non-retryable error on attempt {}: {}",
            self.attempts, self.error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for NonRetryable<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
