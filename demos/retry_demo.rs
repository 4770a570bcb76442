//! Retry Demo
//!
//! Shows a flaky call recovering, a permanent failure failing fast, per-call
//! overrides, and the statistics summary.
//!
//! Run with: cargo run --example retry_demo

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rebound::prelude::*;
use rebound::RetryEvent;

// ==================== Flaky Call ====================

/// Example 1: an operation that fails twice with transient errors.
async fn example_flaky(retrier: &Retrier) {
    println!("\n=== Example 1: Flaky Call ===");

    let attempts = Arc::new(AtomicU32::new(0));
    let result = retrier
        .execute_with_hooks(
            {
                let attempts = attempts.clone();
                move || {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        println!("  Attempt {}", n + 1);
                        if n < 2 {
                            Err(OperationError::with_code("ECONNRESET", "peer reset"))
                        } else {
                            Ok("fetched")
                        }
                    }
                }
            },
            &PolicyOverrides::new(),
            |event: &RetryEvent<'_, OperationError>| {
                println!(
                    "  Attempt {} failed ({}), waiting {:?}",
                    event.attempt, event.error, event.next_delay
                );
            },
        )
        .await;

    match result {
        Ok(outcome) => println!(
            "  Success: {} after {} attempts in {:?}",
            outcome.value, outcome.attempts_used, outcome.elapsed
        ),
        Err(e) => println!("  Failed: {}", e),
    }
}

// ==================== Permanent Failure ====================

/// Example 2: credentials errors are not retried.
async fn example_permanent(retrier: &Retrier) {
    println!("\n=== Example 2: Permanent Failure ===");

    let result = retrier
        .execute(|| async { Err::<(), _>("Invalid authentication credentials") })
        .await;

    if let Err(e) = result {
        println!("  {} (non-retryable: {})", e, e.is_non_retryable());
    }
}

// ==================== Overrides ====================

/// Example 3: a single call with a larger budget and no jitter.
async fn example_overrides(retrier: &Retrier) {
    println!("\n=== Example 3: Per-call Overrides ===");

    let overrides = PolicyOverrides::new()
        .max_attempts(5)
        .base_delay(Duration::from_millis(5))
        .jitter(false);

    let result = retrier
        .execute_with(|| async { Err::<(), _>("503 service unavailable") }, &overrides)
        .await;

    if let Err(e) = result {
        println!("  Gave up after {} attempts", e.attempts());
        for (i, err) in e.errors_seen().enumerate() {
            println!("    #{}: {}", i + 1, err);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let retrier = match Retrier::new(
        RetryPolicy::default().with_base_delay(Duration::from_millis(20)),
    ) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("invalid policy: {}", e);
            return;
        }
    };

    example_flaky(&retrier).await;
    example_permanent(&retrier).await;
    example_overrides(&retrier).await;

    println!("\n=== Statistics ===");
    println!("  {:#?}", retrier.summary());
}
