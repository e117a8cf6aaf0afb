//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod checkpoints;    // twitter_query_checkpoints
mod replied_tweets; // replied_tweets
mod tweets;         // tweets, tweet_media
mod twitter_users;  // twitter_users
