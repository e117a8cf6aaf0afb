//! Platform boundary: everything the pipeline needs from the X API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Tweet, TweetId, TwitterUser, UserId};

/// Lower bounds and page size for a timeline query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineQuery {
    pub since_id: Option<TweetId>,
    pub since_time: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
}

/// One batch of tweets plus the authors the platform expanded alongside them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TweetPage {
    pub tweets: Vec<Tweet>,
    pub users: Vec<TwitterUser>,
}

impl TweetPage {
    pub fn newest_id(&self) -> Option<TweetId> {
        self.tweets.iter().map(|t| t.id).max()
    }

    pub fn user(&self, user_id: UserId) -> Option<&TwitterUser> {
        self.users.iter().find(|u| u.user_id == user_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTweet {
    pub text: String,
    pub in_reply_to_tweet_id: Option<TweetId>,
    pub quote_tweet_id: Option<TweetId>,
    pub media_ids: Vec<String>,
}

#[async_trait]
pub trait TwitterApi: Send + Sync {
    /// Tweets authored by `user_id`, newest first.
    async fn get_users_tweets(&self, user_id: UserId, query: &TimelineQuery) -> Result<TweetPage, String>;

    /// Tweets mentioning `user_id`, newest first.
    async fn get_users_mentions(&self, user_id: UserId, query: &TimelineQuery) -> Result<TweetPage, String>;

    /// A single tweet; an empty page when it does not exist or is not visible.
    async fn get_tweet(&self, tweet_id: TweetId) -> Result<TweetPage, String>;

    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<TwitterUser>, String>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<TwitterUser>, String>;

    /// Returns the new tweet's id.
    async fn create_tweet(&self, tweet: &NewTweet) -> Result<TweetId, String>;

    /// Download an image and upload it as tweet media, returning the media id.
    async fn upload_image_from_url(&self, image_url: &str) -> Result<String, String>;
}
