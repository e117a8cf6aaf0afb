//! Twitter user database operations

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::models::{TwitterUser, UserId};
use super::super::Database;
use super::super::sqlite::format_timestamp;

impl Database {
    /// Insert or refresh a user. A missing follower count keeps the stored one.
    pub fn upsert_twitter_user(&self, user: &TwitterUser) -> SqliteResult<()> {
        let conn = self.conn.lock();
        let now = format_timestamp(&Utc::now());
        conn.execute(
            "INSERT INTO twitter_users (user_id, username, followers_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                followers_count = COALESCE(excluded.followers_count, twitter_users.followers_count),
                updated_at = excluded.updated_at",
            rusqlite::params![
                user.user_id,
                user.username,
                user.followers_count.map(|c| c as i64),
                now
            ],
        )?;
        Ok(())
    }

    pub fn get_twitter_user(&self, user_id: UserId) -> SqliteResult<Option<TwitterUser>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT user_id, username, followers_count FROM twitter_users WHERE user_id = ?1",
            [user_id],
            map_twitter_user_row,
        )
        .optional()
    }

    /// Case-insensitive lookup; handles are not case sensitive on the platform.
    pub fn get_twitter_user_by_username(&self, username: &str) -> SqliteResult<Option<TwitterUser>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT user_id, username, followers_count FROM twitter_users
             WHERE username = ?1 COLLATE NOCASE
             ORDER BY updated_at DESC LIMIT 1",
            [username.trim_start_matches('@')],
            map_twitter_user_row,
        )
        .optional()
    }
}

fn map_twitter_user_row(row: &rusqlite::Row) -> SqliteResult<TwitterUser> {
    Ok(TwitterUser {
        user_id: row.get(0)?,
        username: row.get(1)?,
        followers_count: row.get::<_, Option<i64>>(2)?.map(|c| c.max(0) as u64),
    })
}
