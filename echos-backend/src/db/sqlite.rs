use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;

/// SQLite-backed store for tweets, users, checkpoints and reply records.
///
/// Table-specific methods live in `db::tables::*` as additional `impl Database` blocks.
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Twitter accounts seen by the pipeline (authors, followers, the agent itself)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS twitter_users (
                user_id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                followers_count INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_twitter_users_username
             ON twitter_users(username COLLATE NOCASE)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tweets (
                tweet_id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                author_id INTEGER NOT NULL REFERENCES twitter_users(user_id),
                conversation_id INTEGER NOT NULL,
                tweet_type TEXT NOT NULL,
                reply_to_id INTEGER,
                quote_tweet_id INTEGER,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tweets_author ON tweets(author_id, tweet_id DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tweets_conversation ON tweets(conversation_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tweet_media (
                tweet_id INTEGER NOT NULL REFERENCES tweets(tweet_id) ON DELETE CASCADE,
                media_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (tweet_id, media_id)
            )",
            [],
        )?;

        // One row per (agent, user, query type); last_tweet_id only moves forward
        conn.execute(
            "CREATE TABLE IF NOT EXISTS twitter_query_checkpoints (
                agent_name TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                query_type TEXT NOT NULL,
                last_tweet_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (agent_name, user_id, query_type)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS replied_tweets (
                agent_name TEXT NOT NULL,
                tweet_id INTEGER NOT NULL,
                response_tweet_id INTEGER NOT NULL,
                replied_at TEXT NOT NULL,
                PRIMARY KEY (agent_name, tweet_id)
            )",
            [],
        )?;

        Ok(())
    }
}

/// Timestamps are stored as RFC 3339 UTC strings with fixed millisecond precision.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
