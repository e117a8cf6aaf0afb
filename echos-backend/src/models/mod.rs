mod agent_profile;
mod checkpoint;
mod tweet;

pub use agent_profile::{AgentProfile, FollowerSubscription, SiblingAgent};
pub use checkpoint::{QueryType, TwitterQueryCheckpoint};
pub use tweet::{Tweet, TweetId, TweetType, TwitterUser, UserId};
