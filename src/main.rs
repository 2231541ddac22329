/// Tweet Scheduler Bot
///
/// Posts tweets to one Twitter account at a fixed interval. Tweets are either
/// taken in rotation from a text file or generated with OpenAI around a
/// rotating list of topics. Every post goes through a bounded retry policy
/// with exponential backoff; Ctrl+C stops the agent cleanly.

use anyhow::Result;
use tweet_scheduler_bot::{agent, config, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger, defaulting to info level
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    log::info!("Starting Tweet Scheduler Bot...");

    // Load configuration from environment
    let cfg = config::Config::from_env()?;

    let (trigger, shutdown) = shutdown::channel();
    shutdown::trigger_on_ctrl_c(trigger);

    // Run the agent
    agent::run_agent(cfg, shutdown).await?;

    Ok(())
}
