/// Scheduler Module
///
/// The posting loop: pick or generate a tweet, post it through the retry
/// invoker, then wait for the configured interval. Rotation state is a value
/// threaded from one cycle to the next; the loop suspends only inside the
/// invoker's backoff and during the interval, and stops at either point when
/// shutdown is signalled.

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tokio::time;

use crate::error::ApiError;
use crate::publish::{Composer, PostedTweet, Publisher};
use crate::retry::{Invoker, RetryError, RetryPolicy};
use crate::shutdown::Shutdown;
use crate::status::{AgentStatus, PostRecord, SharedStatus};
use crate::tweets::{select, select_at, truncate_tweet, Cursor};

/// Where tweet text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMode {
    /// Rotate through the predefined list.
    Predefined,
    /// Ask the composer, rotating through `topics` (empty = no topic).
    Generated { topics: Vec<String> },
}

/// Rotation positions carried between cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationState {
    pub tweet_cursor: Cursor,
    pub topic_cursor: Cursor,
}

/// Result of one posting cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Posted(PostRecord),
    Skipped(&'static str),
    /// Twitter accepted the tweet but its confirmation was unreadable.
    Unconfirmed { attempts: u32, reason: String },
    Failed(RetryError<ApiError>),
    Cancelled,
}

pub struct PostingScheduler<P, C> {
    publisher: P,
    composer: Option<C>,
    tweets: Vec<String>,
    mode: ContentMode,
    invoker: Invoker,
    interval: Duration,
    shutdown: Shutdown,
    status: SharedStatus,
}

impl<P: Publisher, C: Composer> PostingScheduler<P, C> {
    pub fn new(
        publisher: P,
        tweets: Vec<String>,
        policy: RetryPolicy,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            publisher,
            composer: None,
            tweets,
            mode: ContentMode::Predefined,
            invoker: Invoker::new(policy, shutdown.clone()),
            interval,
            shutdown,
            status: AgentStatus::shared(Utc::now()),
        }
    }

    pub fn with_composer(mut self, composer: Option<C>) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_mode(mut self, mode: ContentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_status(mut self, status: SharedStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Post once immediately, then once per interval until shutdown.
    pub async fn run(&self) -> Result<()> {
        log::info!(
            "Starting Twitter agent, posting every {} minutes",
            self.interval.as_secs() / 60
        );
        match &self.mode {
            ContentMode::Predefined => log::info!("AI tweet generation: Disabled"),
            ContentMode::Generated { topics } if topics.is_empty() => {
                log::info!("AI tweet generation: Enabled (general topics)")
            }
            ContentMode::Generated { topics } => log::info!(
                "AI tweet generation: Enabled, rotating topics: {}",
                topics.join(", ")
            ),
        }

        let mut state = RotationState::default();
        loop {
            let (outcome, next_state) = self.run_cycle(state).await;
            state = next_state;
            let cancelled = matches!(outcome, CycleOutcome::Cancelled);
            self.report(outcome).await;

            if cancelled || self.shutdown.is_triggered() {
                break;
            }

            let next_post_at = chrono::Duration::from_std(self.interval)
                .ok()
                .map(|d| Utc::now() + d);
            self.status.write().await.next_post_at = next_post_at;

            tokio::select! {
                _ = time::sleep(self.interval) => {}
                _ = self.shutdown.triggered() => break,
            }
        }

        log::info!("Twitter agent stopped");
        Ok(())
    }

    /// Run a single posting cycle starting from `state`.
    ///
    /// Returns what happened and the rotation state for the next cycle.
    pub async fn run_cycle(&self, state: RotationState) -> (CycleOutcome, RotationState) {
        match &self.mode {
            ContentMode::Predefined => self.post_predefined(state).await,
            ContentMode::Generated { topics } => self.post_generated(topics, state).await,
        }
    }

    /// Post the tweet under the cursor. Each retry moves on to the next
    /// tweet so a rejected duplicate is not sent twice.
    async fn post_predefined(&self, state: RotationState) -> (CycleOutcome, RotationState) {
        if self.tweets.is_empty() {
            return (CycleOutcome::Skipped("no predefined tweets available"), state);
        }

        let start = state.tweet_cursor;
        let result = self
            .invoker
            .invoke(|attempt| {
                let offset = attempt.number.saturating_sub(1) as usize;
                let text = select_at(&self.tweets, start, offset)
                    .map(|text| truncate_tweet(text))
                    .unwrap_or_default();
                if attempt.is_retry() {
                    log::info!("Retry {}: posting next tweet: {}", attempt.number - 1, text);
                } else {
                    log::info!("Attempting to post tweet: {}", text);
                }
                let publisher = &self.publisher;
                async move {
                    publisher
                        .publish(&text)
                        .await
                        .map(|posted| (posted, attempt.number))
                }
            })
            .await;

        let consumed = match &result {
            Ok((_, attempts)) => *attempts,
            Err(e) => e.attempts(),
        };
        let len = self.tweets.len();
        let next = RotationState {
            tweet_cursor: Cursor::new((start.position() % len + consumed as usize % len) % len),
            ..state
        };

        (Self::finish(result, false), next)
    }

    /// Generate a tweet for the next topic and post it. Falls back to the
    /// next predefined tweet when generation is unavailable or fails.
    async fn post_generated(
        &self,
        topics: &[String],
        state: RotationState,
    ) -> (CycleOutcome, RotationState) {
        let mut state = state;
        let topic = match select(topics, state.topic_cursor) {
            Some((topic, next)) => {
                state.topic_cursor = next;
                Some(topic.as_str())
            }
            None => None,
        };

        match topic {
            Some(topic) => log::info!("Generating AI tweet about {}", topic),
            None => log::info!("Generating AI tweet"),
        }

        let generated = match &self.composer {
            Some(composer) => match self.invoker.invoke(|_| composer.compose(topic)).await {
                Ok(text) => Some(text),
                Err(e) if e.is_cancelled() => return (CycleOutcome::Cancelled, state),
                Err(e) => {
                    log::error!("Failed to generate AI tweet: {}", e);
                    None
                }
            },
            None => {
                log::warn!("OpenAI client not available, using a predefined tweet");
                None
            }
        };

        let (text, is_generated) = match generated {
            Some(text) => (text, true),
            None => match select(&self.tweets, state.tweet_cursor) {
                Some((text, next)) => {
                    state.tweet_cursor = next;
                    (text.clone(), false)
                }
                None => {
                    return (
                        CycleOutcome::Skipped("no generated or predefined tweet available"),
                        state,
                    )
                }
            },
        };

        let text = truncate_tweet(&text);
        log::info!("Attempting to post tweet: {}", text);
        let result = self
            .invoker
            .invoke(|attempt| {
                let publisher = &self.publisher;
                let text = text.as_str();
                async move {
                    publisher
                        .publish(text)
                        .await
                        .map(|posted| (posted, attempt.number))
                }
            })
            .await;

        (Self::finish(result, is_generated), state)
    }

    fn finish(
        result: Result<(PostedTweet, u32), RetryError<ApiError>>,
        generated: bool,
    ) -> CycleOutcome {
        match result {
            Ok((posted, attempts)) => CycleOutcome::Posted(PostRecord {
                tweet_id: posted.id,
                text: posted.text,
                posted_at: Utc::now(),
                attempts,
                generated,
            }),
            Err(e) if e.is_cancelled() => CycleOutcome::Cancelled,
            Err(RetryError::Fatal { attempt, source }) if source.is_unconfirmed() => {
                CycleOutcome::Unconfirmed {
                    attempts: attempt,
                    reason: source.to_string(),
                }
            }
            Err(e) => CycleOutcome::Failed(e),
        }
    }

    /// Log the outcome and fold it into the shared status.
    async fn report(&self, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Posted(record) => {
                log::info!(
                    "Successfully posted tweet with ID {}: {}",
                    record.tweet_id,
                    record.text
                );
                self.status.write().await.record_post(record);
            }
            CycleOutcome::Skipped(reason) => {
                log::warn!("Skipping this cycle: {}", reason);
                self.status.write().await.record_skip();
            }
            CycleOutcome::Unconfirmed { attempts, reason } => {
                log::warn!(
                    "Tweet was accepted on attempt {} but not confirmed, not retrying: {}",
                    attempts,
                    reason
                );
                self.status.write().await.record_unconfirmed(reason);
            }
            CycleOutcome::Failed(error) => {
                match &error {
                    RetryError::Exhausted { attempts, last } => {
                        log::error!("Failed to post tweet after {} attempts: {}", attempts, last);
                        if last.is_rate_limited() {
                            log::error!(
                                "Still rate limited. Consider increasing the tweet interval \
                                (currently {} minutes) or upgrading the API tier.",
                                self.interval.as_secs() / 60
                            );
                        }
                    }
                    RetryError::Fatal { source, .. } => {
                        log::error!("Posting failed with a non-retryable error: {}", source);
                        if let Some(status) = source.status() {
                            if status.as_u16() == 401 || status.as_u16() == 403 {
                                log::error!(
                                    "Verify the credentials and that 'Read and write' \
                                    permissions are enabled for the app"
                                );
                            }
                        }
                    }
                    RetryError::Cancelled { .. } => {}
                }
                self.status.write().await.record_failure(error.to_string());
            }
            CycleOutcome::Cancelled => {
                log::info!("Posting cycle cancelled by shutdown");
            }
        }
    }
}
