//! Retry policy types and configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use super::classify::{Classifier, DEFAULT_RETRYABLE_CODES, DEFAULT_RETRYABLE_KEYWORDS};

/// A retry policy describing how to retry failed operations.
///
/// Policies are pure data: they describe retry behavior but don't execute it.
/// A [`Retrier`](crate::Retrier) holds one base policy for its whole lifetime;
/// per-call changes go through [`PolicyOverrides`] and [`RetryPolicy::merged`],
/// which produce a fresh effective policy and leave the base untouched.
///
/// # Examples
///
/// ```rust
/// use rebound::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default()
///     .with_max_attempts(5)
///     .with_base_delay(Duration::from_millis(50))
///     .without_jitter();
///
/// assert_eq!(policy.max_attempts(), 5);
/// assert_eq!(policy.base_delay(), Duration::from_millis(50));
/// assert!(!policy.jitter());
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    max_attempts: u32,
    #[cfg_attr(feature = "serde", serde(rename = "base_delay_ms", with = "duration_ms"))]
    base_delay: Duration,
    #[cfg_attr(feature = "serde", serde(rename = "max_delay_ms", with = "duration_ms"))]
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
    retryable_error_codes: BTreeSet<String>,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "keywords::deserialize"))]
    retryable_keywords: Vec<String>,
}

impl Default for RetryPolicy {
    /// Three attempts, 100ms base delay doubling up to 5s, jitter on, and the
    /// standard network error codes and keywords.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            backoff_multiplier: 2.0,
            jitter: true,
            retryable_error_codes: DEFAULT_RETRYABLE_CODES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            retryable_keywords: DEFAULT_RETRYABLE_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Set the total number of attempts, including the first one.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay before the second attempt.
    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    /// Set the maximum delay cap.
    ///
    /// The computed backoff never exceeds this value before jitter is applied.
    ///
    /// ```rust
    /// use rebound::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default()
    ///     .with_max_attempts(10)
    ///     .with_max_delay(Duration::from_millis(500))
    ///     .without_jitter();
    ///
    /// // 100ms, 200ms, 400ms, then capped at 500ms
    /// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    /// assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
    /// ```
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    /// Set the growth factor applied per attempt.
    pub fn with_backoff_multiplier(mut self, factor: f64) -> Self {
        self.backoff_multiplier = factor;
        self
    }

    /// Enable or disable ±5% jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Disable jitter, making delays deterministic.
    pub fn without_jitter(self) -> Self {
        self.with_jitter(false)
    }

    /// Add an error code to the retryable set.
    pub fn with_retryable_code(mut self, code: impl Into<String>) -> Self {
        self.retryable_error_codes.insert(code.into());
        self
    }

    /// Replace the retryable error code set.
    pub fn with_retryable_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_error_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Add a keyword to the message heuristic. Matching is case-insensitive
    /// and an empty keyword is ignored.
    pub fn with_retryable_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword: String = keyword.into();
        self.retryable_keywords.extend(normalize_keywords([keyword]));
        self
    }

    /// Replace the message heuristic keyword table.
    ///
    /// Passing an empty list turns the heuristic off, leaving only code
    /// matching. Empty keywords are dropped.
    pub fn with_retryable_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_keywords = normalize_keywords(keywords);
        self
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the second attempt.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper clamp on the computed delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor per attempt.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Whether jitter is applied.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Codes treated as unconditionally retryable.
    pub fn retryable_error_codes(&self) -> &BTreeSet<String> {
        &self.retryable_error_codes
    }

    /// Lowercase keywords searched for in error messages.
    pub fn retryable_keywords(&self) -> &[String] {
        &self.retryable_keywords
    }

    /// Borrow a classifier backed by this policy's code and keyword tables.
    pub fn classifier(&self) -> Classifier<'_> {
        Classifier::new(&self.retryable_error_codes, &self.retryable_keywords)
    }

    /// Calculate the delay to wait after the given (1-indexed) attempt fails.
    ///
    /// Jitter is applied when enabled, so the result is only deterministic for
    /// policies built with [`without_jitter`](Self::without_jitter).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        super::delay::delay_for_attempt(attempt, self)
    }

    /// Check the policy invariants.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !valid_multiplier(self.backoff_multiplier) {
            return Err(PolicyError::InvalidMultiplier(self.backoff_multiplier));
        }
        Ok(())
    }

    /// Overlay per-call overrides on this policy.
    ///
    /// Only the fields present in `overrides` replace the base values. A zero
    /// `max_attempts` is raised to 1 and an invalid multiplier is ignored, so
    /// the effective policy always satisfies [`validate`](Self::validate) when
    /// the base does.
    ///
    /// ```rust
    /// use rebound::{PolicyOverrides, RetryPolicy};
    ///
    /// let base = RetryPolicy::default();
    /// let effective = base.merged(&PolicyOverrides::new().max_attempts(7).jitter(false));
    ///
    /// assert_eq!(effective.max_attempts(), 7);
    /// assert!(!effective.jitter());
    /// assert_eq!(effective.base_delay(), base.base_delay());
    /// assert_eq!(base.max_attempts(), 3);
    /// ```
    pub fn merged(&self, overrides: &PolicyOverrides) -> RetryPolicy {
        let mut effective = self.clone();
        if let Some(n) = overrides.max_attempts {
            effective.max_attempts = n.max(1);
        }
        if let Some(d) = overrides.base_delay {
            effective.base_delay = d;
        }
        if let Some(d) = overrides.max_delay {
            effective.max_delay = d;
        }
        if let Some(m) = overrides.backoff_multiplier.filter(|m| valid_multiplier(*m)) {
            effective.backoff_multiplier = m;
        }
        if let Some(j) = overrides.jitter {
            effective.jitter = j;
        }
        if let Some(codes) = &overrides.retryable_error_codes {
            effective.retryable_error_codes = codes.clone();
        }
        if let Some(keywords) = &overrides.retryable_keywords {
            effective.retryable_keywords = normalize_keywords(keywords.iter().map(String::as_str));
        }
        effective
    }
}

fn valid_multiplier(m: f64) -> bool {
    m.is_finite() && m > 0.0
}

/// Lowercase keywords and drop empty ones; an empty keyword would match
/// every message.
fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keywords
        .into_iter()
        .map(|k| k.into().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Partial policy applied to a single call.
///
/// Every field is optional; unset fields fall back to the base policy.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PolicyOverrides {
    /// Total attempts for this call.
    pub max_attempts: Option<u32>,
    /// Delay before the second attempt.
    #[cfg_attr(feature = "serde", serde(rename = "base_delay_ms", with = "opt_duration_ms"))]
    pub base_delay: Option<Duration>,
    /// Delay cap.
    #[cfg_attr(feature = "serde", serde(rename = "max_delay_ms", with = "opt_duration_ms"))]
    pub max_delay: Option<Duration>,
    /// Backoff growth factor.
    pub backoff_multiplier: Option<f64>,
    /// Jitter toggle.
    pub jitter: Option<bool>,
    /// Replacement retryable code set.
    pub retryable_error_codes: Option<BTreeSet<String>>,
    /// Replacement keyword table.
    pub retryable_keywords: Option<Vec<String>>,
}

impl PolicyOverrides {
    /// Create an empty overlay that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the attempt budget.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// Override the base delay.
    pub fn base_delay(mut self, d: Duration) -> Self {
        self.base_delay = Some(d);
        self
    }

    /// Override the delay cap.
    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Override the backoff multiplier.
    pub fn backoff_multiplier(mut self, factor: f64) -> Self {
        self.backoff_multiplier = Some(factor);
        self
    }

    /// Override the jitter toggle.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = Some(enabled);
        self
    }

    /// Override the retryable code set.
    pub fn retryable_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_error_codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Override the keyword table.
    pub fn retryable_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }
}

/// Reasons a [`RetryPolicy`] is rejected at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// `max_attempts` was zero; at least one attempt is required.
    ZeroAttempts,
    /// The backoff multiplier was not a finite positive number.
    InvalidMultiplier(f64),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAttempts => write!(f, "max_attempts must be at least 1"),
            Self::InvalidMultiplier(m) => {
                write!(f, "backoff multiplier must be finite and positive, got {}", m)
            }
        }
    }
}

impl std::error::Error for PolicyError {}

#[cfg(feature = "serde")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(feature = "serde")]
mod keywords {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Vec::<String>::deserialize(d).map(super::normalize_keywords)
    }
}

#[cfg(feature = "serde")]
mod opt_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
