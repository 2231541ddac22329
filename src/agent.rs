/// Agent module
///
/// Wires everything together: HTTP client, Twitter and OpenAI clients, the
/// predefined tweet list, the optional status server and the posting loop.

use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;

use crate::config::Config;
use crate::http_server::{self, AppState};
use crate::openai::ContentGenerator;
use crate::scheduler::{ContentMode, PostingScheduler};
use crate::shutdown::Shutdown;
use crate::status::AgentStatus;
use crate::tweets::load_tweets;
use crate::twitter::TwitterClient;

/// Build the shared HTTP client with generous timeouts.
fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .build()
        .context("Failed to create HTTP client")
}

/// Run the agent until `shutdown` fires.
pub async fn run_agent(config: Config, shutdown: Shutdown) -> Result<()> {
    log::info!("Initializing Twitter agent...");

    let tweets = load_tweets(&config.tweets_file)?;
    log::info!(
        "Loaded {} predefined tweets from {}",
        tweets.len(),
        config.tweets_file.display()
    );

    let http_client = build_http_client()?;
    let twitter = TwitterClient::new(
        http_client.clone(),
        config.twitter.clone(),
        config.twitter_api_base.clone(),
    );

    let (mode, composer) = if config.use_ai {
        let composer = ContentGenerator::from_config(http_client, &config);
        match composer {
            Some(_) => log::info!("OpenAI client initialized (model: {})", config.gpt_model),
            None => log::warn!(
                "OPENAI_API_KEY not found, AI tweet generation will not be available"
            ),
        }
        let mode = ContentMode::Generated {
            topics: config.ai_topics.clone(),
        };
        (mode, composer)
    } else {
        (ContentMode::Predefined, None)
    };

    let status = AgentStatus::shared(Utc::now());

    let server = config.status_port.map(|port| {
        let state = AppState {
            status: status.clone(),
        };
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = http_server::serve(port, state, shutdown).await {
                log::error!("Status server stopped: {:#}", e);
            }
        })
    });

    let scheduler = PostingScheduler::new(
        twitter,
        tweets,
        config.retry_policy,
        config.tweet_interval,
        shutdown,
    )
    .with_composer(composer)
    .with_mode(mode)
    .with_status(status);

    scheduler.run().await?;

    if let Some(server) = server {
        server.await.ok();
    }

    Ok(())
}
