/// Tweets Module
///
/// Loading of the predefined tweet list and pure rotation over it. Rotation
/// state is an explicit `Cursor` value owned by the caller; selecting returns
/// the cursor to use next time.

use anyhow::{Context, Result};
use std::path::Path;

/// Maximum tweet length accepted by Twitter.
pub const MAX_TWEET_CHARS: usize = 280;

/// Position in a rotation (over tweets or topics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor(usize);

impl Cursor {
    pub fn new(position: usize) -> Self {
        Cursor(position)
    }

    pub fn position(self) -> usize {
        self.0
    }

    pub fn advance(self, steps: usize) -> Self {
        Cursor(self.0.wrapping_add(steps))
    }
}

/// Pick the item `offset` places after `cursor`, wrapping around.
pub fn select_at<T>(items: &[T], cursor: Cursor, offset: usize) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    let index = (cursor.0 % items.len() + offset % items.len()) % items.len();
    Some(&items[index])
}

/// Pick the item at `cursor` and return the cursor for the following pick.
pub fn select<T>(items: &[T], cursor: Cursor) -> Option<(&T, Cursor)> {
    let item = select_at(items, cursor, 0)?;
    Some((item, Cursor((cursor.0 % items.len() + 1) % items.len())))
}

/// Split line-delimited text into tweets, trimming and skipping blank lines.
pub fn parse_tweets(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load the predefined tweet list from `path`.
pub fn load_tweets(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Tweets file not found or unreadable: {}", path.display()))?;

    let tweets = parse_tweets(&text);
    if tweets.is_empty() {
        log::warn!("No tweets found in {}", path.display());
    }
    Ok(tweets)
}

/// Cut `text` to fit in a tweet, ending with "..." when shortened.
pub fn truncate_tweet(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_TWEET_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_TWEET_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}
