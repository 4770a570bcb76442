//! Retry eligibility: error codes and message heuristics.
//!
//! An error is retryable when it exposes a code from the policy's code set,
//! or when its lowercased message contains one of the policy's keywords.
//! The keyword table is a heuristic. It misclassifies some errors in both
//! directions; the default table includes the bare digit `"5"`, which matches
//! any message containing that digit (`"field5 missing"` is retryable).

use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Error codes retried by default: connection reset, timeout, DNS lookup
/// failure and unreachable host.
pub const DEFAULT_RETRYABLE_CODES: &[&str] =
    &["ECONNRESET", "ETIMEDOUT", "ENOTFOUND", "EHOSTUNREACH"];

/// Message keywords retried by default.
pub const DEFAULT_RETRYABLE_KEYWORDS: &[&str] = &[
    "network",
    "timeout",
    "connection",
    "reset",
    "refused",
    "unreachable",
    "temporarily",
    "temporary",
    "rate limit",
    "5",
    "429",
    "502",
    "503",
    "504",
    "unavailable",
    "service",
];

/// An error the retry classifier can inspect.
///
/// The message comes from `Display`. Types with a machine-readable code
/// override [`error_code`](Self::error_code).
///
/// ```rust
/// use rebound::RetryableError;
/// use std::fmt;
///
/// #[derive(Debug)]
/// struct HttpError(u16);
///
/// impl fmt::Display for HttpError {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "http status {}", self.0)
///     }
/// }
///
/// impl RetryableError for HttpError {}
/// ```
pub trait RetryableError: fmt::Display {
    /// Machine-readable code such as `"ECONNRESET"`, if the error has one.
    fn error_code(&self) -> Option<&str> {
        None
    }
}

impl RetryableError for String {}

impl RetryableError for str {}

impl<T: RetryableError + ?Sized> RetryableError for &T {
    fn error_code(&self) -> Option<&str> {
        (**self).error_code()
    }
}

impl RetryableError for Box<dyn StdError + Send + Sync> {}

impl RetryableError for io::Error {
    fn error_code(&self) -> Option<&str> {
        io_error_code(self.kind())
    }
}

/// POSIX-style code for the I/O error kinds that carry one.
fn io_error_code(kind: io::ErrorKind) -> Option<&'static str> {
    use io::ErrorKind;
    match kind {
        ErrorKind::ConnectionReset => Some("ECONNRESET"),
        ErrorKind::TimedOut => Some("ETIMEDOUT"),
        ErrorKind::HostUnreachable => Some("EHOSTUNREACH"),
        ErrorKind::NetworkUnreachable => Some("ENETUNREACH"),
        ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
        ErrorKind::BrokenPipe => Some("EPIPE"),
        _ => None,
    }
}

/// A plain operation failure with an optional code.
///
/// Handy for wrapping failures from code that reports errors as strings.
///
/// ```rust
/// use rebound::{OperationError, RetryPolicy};
///
/// let policy = RetryPolicy::default();
/// let classifier = policy.classifier();
///
/// assert!(classifier.is_retryable(&OperationError::with_code("ECONNRESET", "peer hung up")));
/// assert!(!classifier.is_retryable(&OperationError::new("Invalid authentication credentials")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    code: Option<String>,
    message: String,
}

impl OperationError {
    /// Create an error with a message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create an error with both a code and a message.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// The error code, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for OperationError {}

impl RetryableError for OperationError {
    fn error_code(&self) -> Option<&str> {
        self.code()
    }
}

/// Decides whether a failure is worth another attempt.
///
/// Borrowed from a [`RetryPolicy`](crate::RetryPolicy) via
/// [`classifier`](crate::RetryPolicy::classifier).
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    codes: &'a BTreeSet<String>,
    keywords: &'a [String],
}

impl<'a> Classifier<'a> {
    /// Build a classifier over a code set and a keyword table.
    ///
    /// Keywords match case-insensitively; empty keywords never match.
    pub fn new(codes: &'a BTreeSet<String>, keywords: &'a [String]) -> Self {
        Self { codes, keywords }
    }

    /// Returns true if the error matches a retryable code or keyword.
    pub fn is_retryable<E: RetryableError + ?Sized>(&self, error: &E) -> bool {
        self.matches(error.error_code(), &error.to_string())
    }

    /// Classify from raw parts.
    pub fn matches(&self, code: Option<&str>, message: &str) -> bool {
        if code.is_some_and(|c| self.codes.contains(c)) {
            return true;
        }
        let message = message.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| message.contains(k.to_lowercase().as_str()))
    }
}
