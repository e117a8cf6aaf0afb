use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::tweet::{TweetId, UserId};

/// Which timeline a checkpoint tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    UserTweets,
    UserMentions,
}

/// Highest tweet id already ingested for (agent, user, query type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterQueryCheckpoint {
    pub agent_name: String,
    pub user_id: UserId,
    pub query_type: QueryType,
    pub last_tweet_id: TweetId,
    pub updated_at: DateTime<Utc>,
}
