use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Platform-assigned tweet identifier. Larger ids are newer.
pub type TweetId = i64;
/// Platform-assigned user identifier.
pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TweetType {
    Original,
    Reply,
    Quote,
    Retweet,
}

/// A tweet as held in the local store.
///
/// `conversation_id` is the id of the root tweet of the thread; a root
/// tweet carries its own id there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: TweetId,
    pub text: String,
    pub author_id: UserId,
    pub conversation_id: TweetId,
    pub created_at: DateTime<Utc>,
    pub tweet_type: TweetType,
    pub reply_to_id: Option<TweetId>,
    pub quote_tweet_id: Option<TweetId>,
    #[serde(default)]
    pub media_ids: Vec<String>,
}

impl Tweet {
    pub fn is_root(&self) -> bool {
        self.id == self.conversation_id
    }

    pub fn has_media(&self) -> bool {
        !self.media_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub user_id: UserId,
    pub username: String,
    pub followers_count: Option<u64>,
}
