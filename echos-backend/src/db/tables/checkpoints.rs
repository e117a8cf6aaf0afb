//! Query checkpoint database operations

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};
use std::str::FromStr;

use crate::models::{QueryType, TweetId, TwitterQueryCheckpoint, UserId};
use super::super::Database;
use super::super::sqlite::{format_timestamp, parse_timestamp};

impl Database {
    pub fn get_checkpoint(
        &self,
        agent_name: &str,
        user_id: UserId,
        query_type: QueryType,
    ) -> SqliteResult<Option<TwitterQueryCheckpoint>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT agent_name, user_id, query_type, last_tweet_id, updated_at
             FROM twitter_query_checkpoints
             WHERE agent_name = ?1 AND user_id = ?2 AND query_type = ?3",
            rusqlite::params![agent_name, user_id, query_type.as_ref()],
            map_checkpoint_row,
        )
        .optional()
    }

    /// Move the checkpoint to `tweet_id` if that is newer than the stored value.
    ///
    /// Runs as a single upsert, so concurrent callers can never move it backwards.
    /// Returns the checkpoint as stored afterwards.
    pub fn advance_checkpoint(
        &self,
        agent_name: &str,
        user_id: UserId,
        query_type: QueryType,
        tweet_id: TweetId,
    ) -> SqliteResult<TwitterQueryCheckpoint> {
        let conn = self.conn.lock();
        let now = format_timestamp(&Utc::now());
        conn.execute(
            "INSERT INTO twitter_query_checkpoints
                (agent_name, user_id, query_type, last_tweet_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(agent_name, user_id, query_type) DO UPDATE SET
                last_tweet_id = excluded.last_tweet_id,
                updated_at = excluded.updated_at
             WHERE excluded.last_tweet_id > twitter_query_checkpoints.last_tweet_id",
            rusqlite::params![agent_name, user_id, query_type.as_ref(), tweet_id, now],
        )?;
        conn.query_row(
            "SELECT agent_name, user_id, query_type, last_tweet_id, updated_at
             FROM twitter_query_checkpoints
             WHERE agent_name = ?1 AND user_id = ?2 AND query_type = ?3",
            rusqlite::params![agent_name, user_id, query_type.as_ref()],
            map_checkpoint_row,
        )
    }

    pub fn list_checkpoints(&self, agent_name: &str) -> SqliteResult<Vec<TwitterQueryCheckpoint>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT agent_name, user_id, query_type, last_tweet_id, updated_at
             FROM twitter_query_checkpoints
             WHERE agent_name = ?1
             ORDER BY query_type, user_id",
        )?;
        let checkpoints = stmt
            .query_map([agent_name], map_checkpoint_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(checkpoints)
    }
}

fn map_checkpoint_row(row: &rusqlite::Row) -> SqliteResult<TwitterQueryCheckpoint> {
    let query_type: String = row.get(2)?;
    let updated_at: String = row.get(4)?;
    Ok(TwitterQueryCheckpoint {
        agent_name: row.get(0)?,
        user_id: row.get(1)?,
        query_type: QueryType::from_str(&query_type).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        last_tweet_id: row.get(3)?,
        updated_at: parse_timestamp(4, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoint() {
        let db = Database::new(":memory:").unwrap();
        assert!(db.get_checkpoint("vader", 1, QueryType::UserMentions).unwrap().is_none());
    }

    #[test]
    fn test_checkpoint_only_moves_forward() {
        let db = Database::new(":memory:").unwrap();

        let cp = db.advance_checkpoint("vader", 1, QueryType::UserMentions, 500).unwrap();
        assert_eq!(cp.last_tweet_id, 500);

        let cp = db.advance_checkpoint("vader", 1, QueryType::UserMentions, 400).unwrap();
        assert_eq!(cp.last_tweet_id, 500);

        let cp = db.advance_checkpoint("vader", 1, QueryType::UserMentions, 500).unwrap();
        assert_eq!(cp.last_tweet_id, 500);

        let cp = db.advance_checkpoint("vader", 1, QueryType::UserMentions, 650).unwrap();
        assert_eq!(cp.last_tweet_id, 650);
    }

    #[test]
    fn test_checkpoints_are_scoped() {
        let db = Database::new(":memory:").unwrap();
        db.advance_checkpoint("vader", 1, QueryType::UserMentions, 500).unwrap();
        db.advance_checkpoint("vader", 1, QueryType::UserTweets, 20).unwrap();
        db.advance_checkpoint("chad", 1, QueryType::UserMentions, 900).unwrap();

        let mentions = db.get_checkpoint("vader", 1, QueryType::UserMentions).unwrap().unwrap();
        assert_eq!(mentions.last_tweet_id, 500);
        let tweets = db.get_checkpoint("vader", 1, QueryType::UserTweets).unwrap().unwrap();
        assert_eq!(tweets.last_tweet_id, 20);

        let listed = db.list_checkpoints("vader").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|cp| cp.agent_name == "vader"));
    }
}
