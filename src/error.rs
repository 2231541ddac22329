/// API Error Module
///
/// One error type for every outbound HTTP call the agent makes (Twitter and
/// OpenAI), classified for the retry invoker.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::retry::{Classify, Disposition};

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },

    /// The provider answered successfully but the body was unusable.
    #[error("{service} response was malformed: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },

    /// The provider accepted the request (2xx) but the response could not be
    /// read or understood. The action has taken effect and must not be repeated.
    #[error("{service} accepted the request but the response was unusable: {reason}")]
    Unconfirmed {
        service: &'static str,
        reason: String,
    },

    #[error("failed to sign request: {0}")]
    Signing(String),
}

impl ApiError {
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        ApiError::Transport { service, source }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS)
    }

    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, ApiError::Unconfirmed { .. })
    }
}

/// Longest server-requested wait honoured. Twitter's rate-limit window is
/// 15 minutes; anything far beyond a few windows is a bogus header.
pub const MAX_SERVER_WAIT: Duration = Duration::from_secs(60 * 60);

/// Statuses worth retrying: rate limiting, request timeout and server errors.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn is_retryable_transport(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

impl Classify for ApiError {
    fn disposition(&self) -> Disposition {
        let retryable = match self {
            ApiError::Transport { source, .. } => is_retryable_transport(source),
            ApiError::Status { status, .. } => is_retryable_status(*status),
            ApiError::Malformed { .. } | ApiError::Unconfirmed { .. } | ApiError::Signing(_) => {
                false
            }
        };

        if retryable {
            Disposition::Retryable
        } else {
            Disposition::Fatal
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok()).map(str::trim)
}

/// Server-requested wait derived from response headers.
///
/// A `retry-after` delta in seconds wins; otherwise Twitter's
/// `x-rate-limit-reset` epoch timestamp is measured against `now`. Resets
/// already in the past (or not representable) yield `None`. The result never
/// exceeds [`MAX_SERVER_WAIT`].
pub fn retry_after_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(seconds) = header_str(headers, "retry-after").and_then(|s| s.parse::<u64>().ok()) {
        return Some(Duration::from_secs(seconds).min(MAX_SERVER_WAIT));
    }

    let reset = header_str(headers, "x-rate-limit-reset").and_then(|s| s.parse::<i64>().ok())?;
    let wait = reset.checked_sub(now.timestamp())?;
    let wait = u64::try_from(wait).ok().filter(|secs| *secs > 0)?;
    Some(Duration::from_secs(wait).min(MAX_SERVER_WAIT))
}
