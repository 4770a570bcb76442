//! Backoff delay calculation.
//!
//! `raw = base * multiplier^(attempt - 1)`, clamped to `max_delay`, then
//! optionally perturbed by up to ±5% and floored to whole milliseconds.

use std::time::Duration;

use super::policy::RetryPolicy;

/// Fraction of the clamped delay spanned by jitter (±half of this).
const JITTER_SPAN: f64 = 0.1;

/// Un-jittered delay in milliseconds after the given (1-indexed) attempt.
///
/// Always within `[0, max_delay]`. Overflowing growth clamps to `max_delay`.
pub fn base_delay_ms(attempt: u32, policy: &RetryPolicy) -> f64 {
    let base = millis_f64(policy.base_delay());
    let max = millis_f64(policy.max_delay());
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let raw = base * policy.backoff_multiplier().powi(exponent);

    if raw.is_nan() {
        // 0 * inf
        return 0.0;
    }
    raw.clamp(0.0, max)
}

/// Whole and fractional milliseconds. Going through nanoseconds keeps whole
/// millisecond values exact.
fn millis_f64(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Apply jitter to a delay given a uniform sample `unit` in `[0, 1)`.
///
/// The result lies within ±5% of `delay_ms` and is never negative.
pub fn apply_jitter(delay_ms: f64, unit: f64) -> f64 {
    (delay_ms + (unit - 0.5) * delay_ms * JITTER_SPAN).max(0.0)
}

/// Delay to wait after the given (1-indexed) attempt fails.
///
/// ```rust
/// use rebound::{retry::delay_for_attempt, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default().without_jitter();
///
/// assert_eq!(delay_for_attempt(1, &policy), Duration::from_millis(100));
/// assert_eq!(delay_for_attempt(2, &policy), Duration::from_millis(200));
/// assert_eq!(delay_for_attempt(3, &policy), Duration::from_millis(400));
/// ```
pub fn delay_for_attempt(attempt: u32, policy: &RetryPolicy) -> Duration {
    let clamped = base_delay_ms(attempt, policy);
    let ms = if policy.jitter() {
        apply_jitter(clamped, rand::random::<f64>())
    } else {
        clamped
    };
    Duration::from_millis(ms.floor() as u64)
}
