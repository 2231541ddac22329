/// Configuration module for credentials, posting interval and retry policy
///
/// The configuration is built once at startup from named variables
/// (typically a .env file plus the process environment) and passed down
/// explicitly. Nothing else in the crate reads the environment.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// OAuth 1.0a user-context credentials for posting tweets.
#[derive(Clone)]
pub struct TwitterCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub twitter: TwitterCredentials,

    /// Root of the Twitter API (e.g., "https://api.twitter.com")
    pub twitter_api_base: String,

    /// OpenAI API key; AI generation falls back to predefined tweets without it
    pub openai_api_key: Option<String>,

    /// Root of the OpenAI API (e.g., "https://api.openai.com/v1")
    pub openai_api_base: String,

    /// Chat model used for tweet generation
    pub gpt_model: String,

    /// Brand the generated tweets promote
    pub brand_name: String,
    pub brand_url: String,
    pub brand_description: String,

    /// File with one predefined tweet per line
    pub tweets_file: PathBuf,

    /// Time between posting cycles
    pub tweet_interval: Duration,

    /// Generate tweets with OpenAI instead of posting predefined ones
    pub use_ai: bool,

    /// Topics rotated through for AI tweets (empty = general brand tweets)
    pub ai_topics: Vec<String>,

    pub retry_policy: RetryPolicy,

    /// Port for the optional status server
    pub status_port: Option<u16>,
}

const TWITTER_CREDENTIAL_VARS: [&str; 4] = [
    "TWITTER_API_KEY",
    "TWITTER_API_SECRET",
    "TWITTER_ACCESS_TOKEN",
    "TWITTER_ACCESS_TOKEN_SECRET",
];

const DEFAULT_BRAND_DESCRIPTION: &str = "A cryptocurrency platform offering simplified crypto trading, \
decentralized finance (DeFi) solutions, an NFT marketplace, payment solutions and banking \
services. It aims to make crypto accessible to regular users, is available on web and mobile \
and focuses on security and ease of use.";

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if credentials are missing or a value is invalid
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<&str> = TWITTER_CREDENTIAL_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            bail!("Missing Twitter API credentials: {}", missing.join(", "));
        }
        let required = |key: &str| get(key).with_context(|| format!("{} must be set", key));

        let twitter = TwitterCredentials {
            api_key: required("TWITTER_API_KEY")?,
            api_secret: required("TWITTER_API_SECRET")?,
            access_token: required("TWITTER_ACCESS_TOKEN")?,
            access_token_secret: required("TWITTER_ACCESS_TOKEN_SECRET")?,
        };

        let interval_minutes: u64 = parse_or(&get, "TWEET_INTERVAL_MINUTES", 180)?;
        if interval_minutes == 0 {
            bail!("TWEET_INTERVAL_MINUTES must be greater than zero");
        }

        let defaults = RetryPolicy::default();
        let retry_policy = RetryPolicy::new(
            parse_or(&get, "RETRY_MAX_ATTEMPTS", defaults.max_attempts())?,
            Duration::from_secs(parse_or(
                &get,
                "RETRY_BASE_DELAY_SECS",
                defaults.base_delay().as_secs(),
            )?),
            Duration::from_secs(parse_or(
                &get,
                "RETRY_MAX_DELAY_SECS",
                defaults.max_delay().as_secs(),
            )?),
            parse_or(&get, "RETRY_JITTER", defaults.jitter_fraction())?,
        )
        .context("Invalid retry policy")?;

        let ai_topics = get("AI_TOPICS")
            .map(|topics| {
                topics
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            twitter,
            twitter_api_base: get("TWITTER_API_BASE")
                .unwrap_or_else(|| "https://api.twitter.com".to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_api_base: get("OPENAI_API_BASE")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            gpt_model: get("GPT_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            brand_name: get("BRAND_NAME").unwrap_or_else(|| "CryptoXpress".to_string()),
            brand_url: get("BRAND_URL")
                .unwrap_or_else(|| "https://www.cryptoxpress.com/".to_string()),
            brand_description: get("BRAND_DESCRIPTION")
                .unwrap_or_else(|| DEFAULT_BRAND_DESCRIPTION.to_string()),
            tweets_file: get("TWEETS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tweets.txt")),
            tweet_interval: Duration::from_secs(interval_minutes * 60),
            use_ai: parse_bool(get("USE_AI_TWEETS").as_deref(), true)?,
            ai_topics,
            retry_policy,
            status_port: get("STATUS_PORT")
                .map(|v| v.parse::<u16>().context("STATUS_PORT must be a port number"))
                .transpose()?,
        })
    }

    pub fn interval_minutes(&self) -> u64 {
        self.tweet_interval.as_secs() / 60
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<&str>, default: bool) -> Result<bool> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("expected a boolean, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 4] = [
        ("TWITTER_API_KEY", "key"),
        ("TWITTER_API_SECRET", "secret"),
        ("TWITTER_ACCESS_TOKEN", "token"),
        ("TWITTER_ACCESS_TOKEN_SECRET", "token-secret"),
    ];

    fn with_credentials(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn reports_every_missing_credential() {
        let err = Config::from_lookup(lookup(&[("TWITTER_API_KEY", "key")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing Twitter API credentials: TWITTER_API_SECRET, TWITTER_ACCESS_TOKEN, TWITTER_ACCESS_TOKEN_SECRET"
        );
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs[0] = ("TWITTER_API_KEY", "   ");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("TWITTER_API_KEY"));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&CREDENTIALS)).unwrap();

        assert_eq!(config.tweet_interval, Duration::from_secs(180 * 60));
        assert_eq!(config.interval_minutes(), 180);
        assert_eq!(config.tweets_file, PathBuf::from("tweets.txt"));
        assert!(config.use_ai);
        assert!(config.ai_topics.is_empty());
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.gpt_model, "gpt-3.5-turbo");
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert_eq!(config.status_port, None);
        assert_eq!(config.twitter.access_token, "token");
    }

    #[test]
    fn reads_overrides() {
        let pairs = with_credentials(&[
            ("TWEET_INTERVAL_MINUTES", "45"),
            ("USE_AI_TWEETS", "false"),
            ("AI_TOPICS", "DeFi solutions, NFT marketplace,, crypto security "),
            ("RETRY_MAX_ATTEMPTS", "3"),
            ("RETRY_BASE_DELAY_SECS", "1"),
            ("RETRY_MAX_DELAY_SECS", "10"),
            ("RETRY_JITTER", "0"),
            ("STATUS_PORT", "8080"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.tweet_interval, Duration::from_secs(45 * 60));
        assert!(!config.use_ai);
        assert_eq!(
            config.ai_topics,
            vec!["DeFi solutions", "NFT marketplace", "crypto security"]
        );
        assert_eq!(
            config.retry_policy,
            RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10), 0.0).unwrap()
        );
        assert_eq!(config.status_port, Some(8080));
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_interval = with_credentials(&[("TWEET_INTERVAL_MINUTES", "0")]);
        assert!(Config::from_lookup(lookup(&zero_interval)).is_err());

        let not_a_number = with_credentials(&[("TWEET_INTERVAL_MINUTES", "soon")]);
        assert!(Config::from_lookup(lookup(&not_a_number)).is_err());

        let bad_policy = with_credentials(&[
            ("RETRY_BASE_DELAY_SECS", "100"),
            ("RETRY_MAX_DELAY_SECS", "10"),
        ]);
        let err = Config::from_lookup(lookup(&bad_policy)).unwrap_err();
        assert!(err.to_string().contains("Invalid retry policy"));

        let bad_flag = with_credentials(&[("USE_AI_TWEETS", "maybe")]);
        assert!(Config::from_lookup(lookup(&bad_flag)).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = Config::from_lookup(lookup(&CREDENTIALS)).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("token-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
