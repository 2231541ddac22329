/// Twitter Module
///
/// Posts tweets through the X (Twitter) API v2 `POST /2/tweets` endpoint
/// using OAuth 1.0a user-context authentication.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::TwitterCredentials;
use crate::error::{retry_after_from_headers, ApiError};
use crate::oauth;
use crate::publish::{PostedTweet, Publisher};

const SERVICE: &str = "Twitter";

#[derive(Debug, Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: Option<CreatedTweet>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct TwitterApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl TwitterApiError {
    fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Client for posting tweets on behalf of one account.
pub struct TwitterClient {
    http_client: reqwest::Client,
    credentials: TwitterCredentials,
    api_base: String,
}

impl TwitterClient {
    pub fn new(
        http_client: reqwest::Client,
        credentials: TwitterCredentials,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            credentials,
            api_base: api_base.into(),
        }
    }

    fn tweets_url(&self) -> String {
        format!("{}/2/tweets", self.api_base.trim_end_matches('/'))
    }

    /// Post a single tweet. No retries happen here.
    pub async fn post_tweet(&self, text: &str) -> Result<PostedTweet, ApiError> {
        let url = self.tweets_url();
        let authorization = oauth::authorization_header(
            "POST",
            &url,
            &[],
            &self.credentials,
            &oauth::nonce(),
            Utc::now().timestamp(),
        )?;

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", authorization)
            .json(&CreateTweetRequest { text })
            .send()
            .await
            .map_err(|e| ApiError::transport(SERVICE, e))?;

        let rate_limit_remaining = response
            .headers()
            .get("x-rate-limit-remaining")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok());

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_from_headers(response.headers(), Utc::now());
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                service: SERVICE,
                status,
                body,
                retry_after,
            });
        }

        if let Some(remaining) = rate_limit_remaining {
            log::info!("Twitter API rate limit: {} requests remaining", remaining);
            if remaining < 5 {
                log::warn!("Low rate limit remaining, consider a longer tweet interval");
            }
        }

        // The tweet exists from here on; nothing below may be retried.
        let body = response.text().await.map_err(|e| ApiError::Unconfirmed {
            service: SERVICE,
            reason: format!("failed to read response body: {}", e),
        })?;
        parse_created_tweet(&body)
    }
}

fn parse_created_tweet(body: &str) -> Result<PostedTweet, ApiError> {
    let parsed: CreateTweetResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Unconfirmed {
            service: SERVICE,
            reason: format!("{} (body: {})", e, body),
        })?;

    match (parsed.data, parsed.errors) {
        (Some(tweet), _) => Ok(PostedTweet {
            id: tweet.id,
            text: tweet.text,
        }),
        (None, Some(errors)) if !errors.is_empty() => Err(ApiError::Unconfirmed {
            service: SERVICE,
            reason: errors
                .iter()
                .map(TwitterApiError::describe)
                .collect::<Vec<_>>()
                .join("; "),
        }),
        _ => Err(ApiError::Unconfirmed {
            service: SERVICE,
            reason: "response contained no tweet".to_string(),
        }),
    }
}

#[async_trait]
impl Publisher for TwitterClient {
    async fn publish(&self, text: &str) -> Result<PostedTweet, ApiError> {
        self.post_tweet(text).await
    }
}
