//! Record of tweets the agent has already answered

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::models::TweetId;
use super::super::Database;
use super::super::sqlite::format_timestamp;

impl Database {
    pub fn has_replied_to(&self, agent_name: &str, tweet_id: TweetId) -> SqliteResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM replied_tweets WHERE agent_name = ?1 AND tweet_id = ?2",
                rusqlite::params![agent_name, tweet_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Returns false if the tweet was already recorded.
    pub fn record_reply(
        &self,
        agent_name: &str,
        tweet_id: TweetId,
        response_tweet_id: TweetId,
    ) -> SqliteResult<bool> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO replied_tweets (agent_name, tweet_id, response_tweet_id, replied_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![agent_name, tweet_id, response_tweet_id, format_timestamp(&Utc::now())],
        )?;
        Ok(inserted > 0)
    }
}
