//! Executor tests.
//!
//! Time is paused so backoff sleeps resolve instantly while still advancing
//! the tokio clock.

use super::*;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

fn retrier(max_attempts: u32) -> Retrier {
    Retrier::new(
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .without_jitter(),
    )
    .unwrap()
}

/// Operation that fails with `messages[n]` on call `n` and succeeds once the
/// list runs out.
fn scripted(
    messages: Vec<&'static str>,
    calls: Arc<AtomicU32>,
) -> impl FnMut() -> Ready<Result<&'static str, &'static str>> {
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
        ready(match messages.get(n) {
            Some(msg) => Err(*msg),
            None => Ok("success"),
        })
    }
}

fn always_failing(
    message: &'static str,
    calls: Arc<AtomicU32>,
) -> impl FnMut() -> Ready<Result<(), &'static str>> {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        ready(Err(message))
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_on_third_attempt() {
    let retrier = retrier(3);
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = retrier
        .execute(scripted(vec!["timeout", "connection reset"], calls.clone()))
        .await
        .unwrap();

    assert!(outcome.succeeded());
    assert_eq!(outcome.value, "success");
    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(outcome.retries(), 2);
    assert_eq!(outcome.errors_seen, vec!["timeout", "connection reset"]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let stats = retrier.stats();
    assert_eq!(stats.total_retries, 2);
    assert_eq!(stats.successful_operations, 1);
    assert_eq!(stats.failed_operations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_exactly_max_attempts() {
    for n in 1..=6 {
        let retrier = retrier(n);
        let calls = Arc::new(AtomicU32::new(0));

        let err = retrier
            .execute(always_failing("network timeout", calls.clone()))
            .await
            .unwrap_err();

        assert!(err.is_exhausted(), "n = {}", n);
        assert_eq!(err.attempts(), n);
        assert_eq!(err.errors_seen().count(), n as usize);
        assert_eq!(calls.load(Ordering::SeqCst), n);
        assert_eq!(retrier.stats().total_retries, u64::from(n - 1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_stops_immediately() {
    for max_attempts in [1, 2, 5, 10] {
        let retrier = retrier(max_attempts);
        let calls = Arc::new(AtomicU32::new(0));

        let err = retrier
            .execute(always_failing(
                "Invalid authentication credentials",
                calls.clone(),
            ))
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        if max_attempts == 1 {
            // final attempt wins over classification
            assert!(err.is_exhausted());
        } else {
            assert!(err.is_non_retryable());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_on_attempt_k_skips_sleep() {
    let retrier = retrier(5);
    let calls = Arc::new(AtomicU32::new(0));
    let mut hook_calls = 0;

    let err = retrier
        .execute_with_hooks(
            scripted(vec!["timeout", "timeout", "permission denied"], calls.clone()),
            &PolicyOverrides::new(),
            |_: &RetryEvent<'_, &str>| hook_calls += 1,
        )
        .await
        .unwrap_err();

    match &err {
        RetryError::NonRetryable(e) => {
            assert_eq!(e.error, "permission denied");
            assert_eq!(e.earlier_errors, vec!["timeout", "timeout"]);
            assert_eq!(e.attempts, 3);
        }
        other => panic!("expected NonRetryable, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(hook_calls, 2);
    // 100ms + 200ms of backoff, and no 400ms sleep after the third attempt
    assert!(err.elapsed() >= Duration::from_millis(300));
    assert!(err.elapsed() < Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_retryable_error_on_last_attempt_is_exhausted() {
    let retrier = retrier(2);
    let calls = Arc::new(AtomicU32::new(0));

    let err = retrier
        .execute(scripted(vec!["timeout", "bad request"], calls.clone()))
        .await
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(err.into_errors(), vec!["timeout", "bad request"]);
}

#[tokio::test(start_paused = true)]
async fn test_hook_sees_backoff_sequence() {
    let retrier = retrier(4);
    let mut events = Vec::new();

    let _ = retrier
        .execute_with_hooks(
            always_failing("503", Arc::new(AtomicU32::new(0))),
            &PolicyOverrides::new(),
            |event: &RetryEvent<'_, &str>| events.push((event.attempt, event.next_delay)),
        )
        .await;

    assert_eq!(
        events,
        vec![
            (1, Duration::from_millis(100)),
            (2, Duration::from_millis(200)),
            (3, Duration::from_millis(400)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_jittered_delays_stay_within_five_percent() {
    let retrier = Retrier::new(RetryPolicy::default().with_max_attempts(6)).unwrap();
    let mut delays = Vec::new();

    let _ = retrier
        .execute_with_hooks(
            always_failing("timeout", Arc::new(AtomicU32::new(0))),
            &PolicyOverrides::new(),
            |event: &RetryEvent<'_, &str>| delays.push(event.next_delay.as_millis()),
        )
        .await;

    let expected = [100u128, 200, 400, 800, 1600];
    assert_eq!(delays.len(), expected.len());
    for (actual, nominal) in delays.iter().zip(expected) {
        let low = nominal * 95 / 100;
        let high = nominal * 105 / 100;
        assert!(
            (low..=high).contains(actual),
            "{}ms outside ±5% of {}ms",
            actual,
            nominal
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_overrides_apply_to_one_call_only() {
    let retrier = retrier(3);
    let overrides = PolicyOverrides::new().max_attempts(5);

    let calls = Arc::new(AtomicU32::new(0));
    let err = retrier
        .execute_with(always_failing("timeout", calls.clone()), &overrides)
        .await
        .unwrap_err();
    assert_eq!(err.attempts(), 5);

    let calls = Arc::new(AtomicU32::new(0));
    let err = retrier
        .execute(always_failing("timeout", calls.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.attempts(), 3);
    assert_eq!(retrier.policy().max_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_override_codes_change_classification() {
    let retrier = retrier(3);
    let overrides = PolicyOverrides::new()
        .retryable_codes(["EAGAIN"])
        .retryable_keywords(Vec::<String>::new());

    let calls = Arc::new(AtomicU32::new(0));
    let outcome = retrier
        .execute_with(
            {
                let calls = calls.clone();
                move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    ready(if n == 0 {
                        Err(OperationError::with_code("EAGAIN", "try again"))
                    } else {
                        Ok(n)
                    })
                }
            },
            &overrides,
        )
        .await
        .unwrap();

    assert_eq!(outcome.attempts_used, 2);
    assert!(!retrier.is_retryable(&OperationError::with_code("EAGAIN", "try again")));
}

#[tokio::test(start_paused = true)]
async fn test_total_operations_counted_before_first_attempt() {
    let retrier = retrier(1);
    let observed = {
        let handle = retrier.clone();
        retrier
            .execute(move || ready(Ok::<_, String>(handle.stats())))
            .await
            .unwrap()
            .into_value()
    };

    assert_eq!(observed.total_operations, 1);
    assert_eq!(observed.successful_operations, 0);
    assert_eq!(observed.in_flight(), 1);
    assert_eq!(retrier.stats().successful_operations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stats_aggregate_across_calls() {
    let retrier = retrier(3);

    retrier
        .execute(scripted(vec!["timeout"], Arc::new(AtomicU32::new(0))))
        .await
        .unwrap();
    retrier
        .execute(always_failing("timeout", Arc::new(AtomicU32::new(0))))
        .await
        .unwrap_err();
    retrier
        .execute(always_failing("forbidden", Arc::new(AtomicU32::new(0))))
        .await
        .unwrap_err();
    retrier
        .execute(scripted(vec![], Arc::new(AtomicU32::new(0))))
        .await
        .unwrap();

    let stats = retrier.stats();
    assert_eq!(stats.total_operations, 4);
    assert_eq!(stats.successful_operations, 2);
    assert_eq!(stats.failed_operations, 2);
    // 1 + 2 + 0 + 0
    assert_eq!(stats.total_retries, 3);
    assert_eq!(stats.success_rate, 0.5);
    assert_eq!(stats.average_attempts_per_operation, 1.75);
    assert_eq!(retrier.stats(), stats);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_stats() {
    let retrier = retrier(3);

    let calls = (0..20).map(|i| {
        let retrier = retrier.clone();
        async move {
            let messages = if i % 2 == 0 { vec!["timeout"] } else { vec![] };
            retrier
                .execute(scripted(messages, Arc::new(AtomicU32::new(0))))
                .await
        }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    let stats = retrier.stats();
    assert_eq!(stats.total_operations, 20);
    assert_eq!(stats.successful_operations, 20);
    assert_eq!(stats.total_retries, 10);
    assert_eq!(stats.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_tasks_on_runtime() {
    let retrier = retrier(2);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let retrier = retrier.clone();
            tokio::spawn(async move {
                retrier
                    .execute(|| ready(Err::<(), _>("timeout".to_string())))
                    .await
                    .is_err()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    let stats = retrier.stats();
    assert_eq!(stats.failed_operations, 8);
    assert_eq!(stats.total_retries, 8);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_logs_retry_and_exhaustion() {
    let retrier = retrier(2);

    let _ = retrier
        .execute(always_failing("socket timeout", Arc::new(AtomicU32::new(0))))
        .await;

    assert!(logs_contain("attempt failed, retrying"));
    assert!(logs_contain("delay_ms=100"));
    assert!(logs_contain("retry attempts exhausted"));
    assert!(logs_contain("socket timeout"));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_logs_non_retryable() {
    let retrier = retrier(3);

    let _ = retrier
        .execute(always_failing("bad request", Arc::new(AtomicU32::new(0))))
        .await;

    assert!(logs_contain("non-retryable error, giving up"));
    assert!(!logs_contain("attempt failed, retrying"));
}

#[tokio::test]
async fn test_summary_reports_identity_and_codes() {
    let retrier = Retrier::default();
    retrier
        .execute(|| ready(Ok::<_, String>(())))
        .await
        .unwrap();

    let before = chrono::Utc::now();
    let summary = retrier.summary();
    assert_eq!(summary.id, retrier.id());
    assert_eq!(summary.id.get_version_num(), 4);
    assert_eq!(summary.version, env!("CARGO_PKG_VERSION"));
    assert!(summary.timestamp >= before);
    assert!(summary.timestamp <= chrono::Utc::now());
    assert_eq!(summary.stats.total_operations, 1);
    assert_eq!(
        summary.retryable_error_codes,
        vec!["ECONNRESET", "EHOSTUNREACH", "ENOTFOUND", "ETIMEDOUT"]
    );
    assert_eq!(retrier.clone().id(), retrier.id());
    assert_ne!(Retrier::default().id(), retrier.id());
}

#[cfg(feature = "serde")]
#[tokio::test]
async fn test_summary_serializes_to_json() {
    let retrier = Retrier::default();
    let json = serde_json::to_value(retrier.summary()).unwrap();

    assert_eq!(json["id"], retrier.id().to_string());
    let timestamp: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(json["timestamp"].clone()).unwrap();
    assert!(timestamp <= chrono::Utc::now());
    assert_eq!(json["stats"]["total_operations"], 0);
    assert_eq!(json["stats"]["success_rate"], 0.0);
    assert!(json["retryable_error_codes"].is_array());
}

#[test]
fn test_retries_saturate_for_hand_built_outcome() {
    let outcome = Outcome {
        value: (),
        attempts_used: 0,
        elapsed: Duration::ZERO,
        errors_seen: Vec::<String>::new(),
        completed_at: std::time::SystemTime::now(),
    };

    assert_eq!(outcome.retries(), 0);
}

#[test]
fn test_new_rejects_invalid_policy() {
    assert_eq!(
        Retrier::new(RetryPolicy::default().with_max_attempts(0)).unwrap_err(),
        PolicyError::ZeroAttempts
    );
}
