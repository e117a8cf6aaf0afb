//! Tweet database operations (tweets + tweet_media)

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use std::str::FromStr;

use crate::models::{Tweet, TweetId, TweetType, UserId};
use super::super::Database;
use super::super::sqlite::{format_timestamp, parse_timestamp};

const TWEET_COLUMNS: &str =
    "tweet_id, text, author_id, conversation_id, tweet_type, reply_to_id, quote_tweet_id, created_at";

impl Database {
    /// Insert a tweet, or refresh it if already stored. The author row must exist.
    pub fn upsert_tweet(&self, tweet: &Tweet) -> SqliteResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO tweets (tweet_id, text, author_id, conversation_id, tweet_type,
                                 reply_to_id, quote_tweet_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(tweet_id) DO UPDATE SET
                text = excluded.text,
                author_id = excluded.author_id,
                conversation_id = excluded.conversation_id,
                tweet_type = excluded.tweet_type,
                reply_to_id = excluded.reply_to_id,
                quote_tweet_id = excluded.quote_tweet_id,
                created_at = excluded.created_at",
            rusqlite::params![
                tweet.id,
                tweet.text,
                tweet.author_id,
                tweet.conversation_id,
                tweet.tweet_type.as_ref(),
                tweet.reply_to_id,
                tweet.quote_tweet_id,
                format_timestamp(&tweet.created_at),
            ],
        )?;
        for (position, media_id) in tweet.media_ids.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO tweet_media (tweet_id, media_id, position) VALUES (?1, ?2, ?3)",
                rusqlite::params![tweet.id, media_id, position as i64],
            )?;
        }
        tx.commit()
    }

    pub fn get_tweet(&self, tweet_id: TweetId) -> SqliteResult<Option<Tweet>> {
        let conn = self.conn.lock();
        let tweet = conn
            .query_row(
                &format!("SELECT {} FROM tweets WHERE tweet_id = ?1", TWEET_COLUMNS),
                [tweet_id],
                map_tweet_row,
            )
            .optional()?;
        match tweet {
            Some(mut tweet) => {
                tweet.media_ids = load_media_ids(&conn, tweet.id)?;
                Ok(Some(tweet))
            }
            None => Ok(None),
        }
    }

    /// Most recent tweets by an author, newest first.
    pub fn get_tweets_by_author(&self, author_id: UserId, limit: usize) -> SqliteResult<Vec<Tweet>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tweets WHERE author_id = ?1 ORDER BY tweet_id DESC LIMIT ?2",
            TWEET_COLUMNS
        ))?;
        let mut tweets = stmt
            .query_map(rusqlite::params![author_id, limit as i64], map_tweet_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        for tweet in tweets.iter_mut() {
            tweet.media_ids = load_media_ids(&conn, tweet.id)?;
        }
        Ok(tweets)
    }
}

fn load_media_ids(conn: &Connection, tweet_id: TweetId) -> SqliteResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT media_id FROM tweet_media WHERE tweet_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map([tweet_id], |row| row.get::<_, String>(0))?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(ids)
}

fn map_tweet_row(row: &rusqlite::Row) -> SqliteResult<Tweet> {
    let tweet_type: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(Tweet {
        id: row.get(0)?,
        text: row.get(1)?,
        author_id: row.get(2)?,
        conversation_id: row.get(3)?,
        tweet_type: TweetType::from_str(&tweet_type).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        reply_to_id: row.get(5)?,
        quote_tweet_id: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
        media_ids: Vec::new(),
    })
}
