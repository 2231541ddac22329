/// OpenAI Module
///
/// Generates short marketing tweets with the chat completions API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{retry_after_from_headers, ApiError};
use crate::publish::Composer;
use crate::tweets::{truncate_tweet, MAX_TWEET_CHARS};

const SERVICE: &str = "OpenAI";

/// A chat message ("system", "user" or "assistant")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// What the generated tweets are about.
#[derive(Debug, Clone)]
pub struct Brand {
    pub name: String,
    pub url: String,
    pub description: String,
}

pub struct ContentGenerator {
    http_client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    brand: Brand,
}

impl ContentGenerator {
    pub fn new(
        http_client: reqwest::Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
        brand: Brand,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            api_base: api_base.into(),
            model: model.into(),
            brand,
        }
    }

    /// Build a generator from the configuration, if an API key is present.
    pub fn from_config(http_client: reqwest::Client, config: &Config) -> Option<Self> {
        let api_key = config.openai_api_key.as_ref()?;
        Some(Self::new(
            http_client,
            api_key.clone(),
            config.openai_api_base.clone(),
            config.gpt_model.clone(),
            Brand {
                name: config.brand_name.clone(),
                url: config.brand_url.clone(),
                description: config.brand_description.clone(),
            },
        ))
    }

    /// System and user prompt for one tweet.
    pub fn build_messages(&self, topic: Option<&str>) -> Vec<ChatMessage> {
        let brand = &self.brand;
        let subject = match topic {
            Some(topic) => format!("about {}", topic),
            None => format!("about {} services", brand.name),
        };

        vec![
            ChatMessage {
                role: "system".to_string(),
                content: format!(
                    "You are a marketing expert for {name}. Generate ONE short, engaging tweet {subject}. \
                    The tweet must be under {limit} characters, include relevant hashtags, and be written \
                    in a professional yet approachable tone. Do not use excessive emojis or hype language. \
                    Include the URL {url} only if it fits naturally.\n\
                    Context: {description}\n\
                    Website: {url}",
                    name = brand.name,
                    subject = subject,
                    limit = MAX_TWEET_CHARS,
                    url = brand.url,
                    description = brand.description,
                ),
            },
            ChatMessage {
                role: "user".to_string(),
                content: format!(
                    "Write a single marketing tweet {}. Must be under {} characters.",
                    subject, MAX_TWEET_CHARS
                ),
            },
        ]
    }

    /// Ask the model for one tweet. The result is trimmed and cut to fit.
    pub async fn generate_tweet(&self, topic: Option<&str>) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: self.build_messages(topic),
            temperature: 0.7,
            max_tokens: 100,
        };

        let response = self
            .http_client
            .post(format!(
                "{}/chat/completions",
                self.api_base.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_from_headers(response.headers(), chrono::Utc::now());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ApiError::Status {
                service: SERVICE,
                status,
                body,
                retry_after,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::transport(SERVICE, e))?;
        let tweet = parse_chat_response(&body)?;
        log::info!("AI generated tweet: {}", tweet);
        Ok(tweet)
    }
}

fn parse_chat_response(body: &str) -> Result<String, ApiError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| ApiError::Malformed {
        service: SERVICE,
        reason: format!("{} (body: {})", e, body),
    })?;

    let content = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ApiError::Malformed {
            service: SERVICE,
            reason: "no choices returned".to_string(),
        })?;

    let tweet = truncate_tweet(content.trim().trim_matches('"'));
    if tweet.is_empty() {
        return Err(ApiError::Malformed {
            service: SERVICE,
            reason: "empty completion".to_string(),
        });
    }
    Ok(tweet)
}

#[async_trait]
impl Composer for ContentGenerator {
    async fn compose(&self, topic: Option<&str>) -> Result<String, ApiError> {
        self.generate_tweet(topic).await
    }
}
