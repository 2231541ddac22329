use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tweet_scheduler_bot::config::TwitterCredentials;
use tweet_scheduler_bot::error::ApiError;
use tweet_scheduler_bot::openai::{Brand, ContentGenerator};
use tweet_scheduler_bot::retry::{Classify, Disposition, Invoker, RetryError, RetryPolicy};
use tweet_scheduler_bot::shutdown::Shutdown;
use tweet_scheduler_bot::twitter::TwitterClient;

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn twitter_client(base: &str) -> TwitterClient {
    let credentials = TwitterCredentials {
        api_key: "consumer-key".to_string(),
        api_secret: "consumer-secret".to_string(),
        access_token: "access-token".to_string(),
        access_token_secret: "access-secret".to_string(),
    };
    TwitterClient::new(reqwest::Client::new(), credentials, base)
}

fn generator(base: &str) -> ContentGenerator {
    ContentGenerator::new(
        reqwest::Client::new(),
        "sk-test",
        base,
        "gpt-3.5-turbo",
        Brand {
            name: "CryptoXpress".to_string(),
            url: "https://www.cryptoxpress.com/".to_string(),
            description: "A crypto platform".to_string(),
        },
    )
}

/// Read one HTTP request, headers and body, off the socket.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Answers every POST with `201 Created` but closes the connection partway
/// through the promised body.
async fn spawn_truncating_server(posts: Arc<AtomicU32>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let posts = posts.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                if request.starts_with("POST /2/tweets") {
                    posts.fetch_add(1, Ordering::SeqCst);
                }
                let head = "HTTP/1.1 201 Created\r\n\
                    content-type: application/json\r\n\
                    content-length: 200\r\n\r\n";
                socket.write_all(head.as_bytes()).await.ok();
                socket.write_all(br#"{"data":{"id":"1""#).await.ok();
                socket.shutdown().await.ok();
            });
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn accepted_tweet_with_cut_off_body_is_posted_once() {
    let posts = Arc::new(AtomicU32::new(0));
    let base = spawn_truncating_server(posts.clone()).await;
    let client = twitter_client(&base);
    let policy =
        RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50), 0.0).unwrap();
    let invoker = Invoker::new(policy, Shutdown::never());

    let result = invoker.invoke(|_| client.post_tweet("hello")).await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        RetryError::Fatal {
            attempt: 1,
            source: ApiError::Unconfirmed { .. }
        }
    ));
    assert_eq!(posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn created_tweet_is_returned() {
    let router = Router::new().route(
        "/2/tweets",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            let signed = headers
                .get("authorization")
                .and_then(|h| h.to_str().ok())
                .is_some_and(|h| h.starts_with("OAuth ") && h.contains("oauth_signature="));
            if !signed {
                return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
            }
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "data": {"id": "1445880548472328192", "text": body["text"]}
                })),
            )
        }),
    );
    let base = serve(router).await;

    let posted = twitter_client(&base).post_tweet("gm #crypto").await.unwrap();

    assert_eq!(posted.id, "1445880548472328192");
    assert_eq!(posted.text, "gm #crypto");
}

#[tokio::test]
async fn rate_limit_response_carries_the_reset_wait() {
    let router = Router::new().route(
        "/2/tweets",
        post(|| async {
            let reset = (chrono::Utc::now().timestamp() + 120).to_string();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    ("x-rate-limit-remaining", "0".to_string()),
                    ("x-rate-limit-reset", reset),
                ],
                "Too Many Requests",
            )
        }),
    );
    let base = serve(router).await;

    let err = twitter_client(&base).post_tweet("gm").await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(err.disposition(), Disposition::Retryable);
    let wait = err.retry_after().unwrap();
    assert!(wait >= Duration::from_secs(118) && wait <= Duration::from_secs(120));
    assert!(err.to_string().contains("Too Many Requests"));
}

#[tokio::test]
async fn duplicate_rejection_is_fatal() {
    let router = Router::new().route(
        "/2/tweets",
        post(|| async {
            (
                StatusCode::FORBIDDEN,
                r#"{"detail":"You are not allowed to create a Tweet with duplicate content."}"#,
            )
        }),
    );
    let base = serve(router).await;

    let err = twitter_client(&base).post_tweet("gm").await.unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(403));
    assert_eq!(err.disposition(), Disposition::Fatal);
    assert_eq!(err.retry_after(), None);
}

#[tokio::test]
async fn completion_is_returned_as_a_tweet() {
    let router = Router::new().route(
        "/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            let authorized = headers
                .get("authorization")
                .and_then(|h| h.to_str().ok())
                == Some("Bearer sk-test");
            if !authorized || body["max_tokens"] != 100 {
                return (StatusCode::BAD_REQUEST, Json(serde_json::json!({})));
            }
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "\"DeFi made simple #DeFi\""}}]
                })),
            )
        }),
    );
    let base = serve(router).await;

    let tweet = generator(&base).generate_tweet(Some("DeFi")).await.unwrap();

    assert_eq!(tweet, "DeFi made simple #DeFi");
}

#[tokio::test]
async fn overloaded_model_is_retryable_with_server_wait() {
    let router = Router::new().route(
        "/chat/completions",
        post(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("retry-after", "7")],
                "The engine is currently overloaded",
            )
        }),
    );
    let base = serve(router).await;

    let err = generator(&base).generate_tweet(None).await.unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(err.disposition(), Disposition::Retryable);
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}
