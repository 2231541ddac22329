/// Publishing seams
///
/// The posting loop only needs "post this text" and "write me a tweet". These
/// traits keep it independent of the concrete Twitter and OpenAI clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A tweet the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedTweet {
    pub id: String,
    pub text: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Post `text` once. Retrying is the caller's business.
    async fn publish(&self, text: &str) -> Result<PostedTweet, ApiError>;
}

#[async_trait]
pub trait Composer: Send + Sync {
    /// Produce tweet text, optionally focused on `topic`.
    async fn compose(&self, topic: Option<&str>) -> Result<String, ApiError>;
}
