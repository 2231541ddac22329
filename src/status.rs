/// Agent status shared between the posting loop and the status server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub tweet_id: String,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    pub attempts: u32,
    /// Whether the text came from the language model.
    pub generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub started_at: DateTime<Utc>,
    pub cycles: u64,
    pub total_posts: u64,
    pub total_failures: u64,
    /// Posts Twitter accepted without a readable confirmation.
    pub unconfirmed_posts: u64,
    pub last_post: Option<PostRecord>,
    pub last_error: Option<String>,
    pub next_post_at: Option<DateTime<Utc>>,
}

pub type SharedStatus = Arc<RwLock<AgentStatus>>;

impl AgentStatus {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            cycles: 0,
            total_posts: 0,
            total_failures: 0,
            unconfirmed_posts: 0,
            last_post: None,
            last_error: None,
            next_post_at: None,
        }
    }

    pub fn shared(started_at: DateTime<Utc>) -> SharedStatus {
        Arc::new(RwLock::new(Self::new(started_at)))
    }

    pub fn record_post(&mut self, record: PostRecord) {
        self.cycles += 1;
        self.total_posts += 1;
        self.last_post = Some(record);
    }

    pub fn record_failure(&mut self, error: String) {
        self.cycles += 1;
        self.total_failures += 1;
        self.last_error = Some(error);
    }

    pub fn record_unconfirmed(&mut self, reason: String) {
        self.cycles += 1;
        self.unconfirmed_posts += 1;
        self.last_error = Some(reason);
    }

    pub fn record_skip(&mut self) {
        self.cycles += 1;
    }
}
