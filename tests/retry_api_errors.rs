use reqwest::StatusCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use tweet_scheduler_bot::error::ApiError;
use tweet_scheduler_bot::retry::{Invoker, RetryError, RetryPolicy};
use tweet_scheduler_bot::shutdown::Shutdown;

fn twitter_error(code: u16, retry_after: Option<Duration>) -> ApiError {
    ApiError::Status {
        service: "Twitter",
        status: StatusCode::from_u16(code).unwrap(),
        body: String::new(),
        retry_after,
    }
}

fn invoker(max_attempts: u32) -> Invoker {
    let policy = RetryPolicy::new(
        max_attempts,
        Duration::from_secs(1),
        Duration::from_secs(10),
        0.0,
    )
    .unwrap();
    Invoker::new(policy, Shutdown::never())
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_for_the_server_reset() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let result = invoker(3)
        .invoke(|_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(twitter_error(429, Some(Duration::from_secs(15 * 60))))
                } else {
                    Ok("posted")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "posted");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(15 * 60));
}

#[tokio::test(start_paused = true)]
async fn unauthorized_is_never_retried() {
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = invoker(5)
        .invoke(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(twitter_error(401, None)) }
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::Fatal { attempt: 1, .. }));
    assert_eq!(err.into_inner().unwrap().status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn server_errors_exhaust_with_the_last_failure() {
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = invoker(4)
        .invoke(|_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(twitter_error(if n < 3 { 503 } else { 502 }, None)) }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.attempts(), 4);
    assert!(err.to_string().starts_with("retries exhausted after 4 attempts"));
    assert_eq!(err.into_inner().unwrap().status(), Some(StatusCode::BAD_GATEWAY));
}
