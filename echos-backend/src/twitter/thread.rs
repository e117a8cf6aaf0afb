//! Reply-chain reconstruction and mention enrichment.

use std::collections::HashSet;

use super::api::TwitterApi;
use super::pipeline::{get_tweet, get_username_from_user_id};
use super::types::{HydratedTweet, TweetMention};
use crate::db::Database;
use crate::models::Tweet;

/// Upper bound on ancestors walked for one tweet.
pub const MAX_THREAD_DEPTH: usize = 100;

/// Ancestors of `tweet`, root first.
///
/// Each parent is resolved from the store before the platform. A parent that
/// cannot be found ends the chain there.
pub async fn get_parent_tweets(
    db: &Database,
    api: &dyn TwitterApi,
    tweet: &Tweet,
) -> Result<Vec<Tweet>, String> {
    if tweet.is_root() {
        return Ok(Vec::new());
    }

    let mut parents: Vec<Tweet> = Vec::new();
    let mut visited: HashSet<i64> = HashSet::from([tweet.id]);
    let mut next_id = tweet.reply_to_id;

    while let Some(parent_id) = next_id {
        if parents.len() >= MAX_THREAD_DEPTH {
            log::warn!("Twitter: Thread for {} exceeds {} tweets, truncating", tweet.id, MAX_THREAD_DEPTH);
            break;
        }
        if !visited.insert(parent_id) {
            log::warn!("Twitter: Reply cycle at {} while walking thread of {}", parent_id, tweet.id);
            break;
        }

        let Some(parent) = get_tweet(db, api, parent_id).await? else {
            log::warn!("Twitter: Parent tweet {} of {} not found, truncating thread", parent_id, tweet.id);
            break;
        };
        next_id = if parent.is_root() { None } else { parent.reply_to_id };
        parents.push(parent);
    }

    parents.sort_by_key(|t| t.created_at);
    Ok(parents)
}

async fn hydrate(db: &Database, api: &dyn TwitterApi, tweet: Tweet) -> Result<HydratedTweet, String> {
    let username = get_username_from_user_id(db, api, tweet.author_id).await?;
    Ok(HydratedTweet::new(tweet, username))
}

/// Reconstruct the thread around a tagged tweet and attach author handles.
pub async fn build_mention(db: &Database, api: &dyn TwitterApi, tagged: Tweet) -> Result<TweetMention, String> {
    let parents = get_parent_tweets(db, api, &tagged).await?;

    let mut hydrated_parents = Vec::with_capacity(parents.len());
    for parent in parents {
        hydrated_parents.push(hydrate(db, api, parent).await?);
    }
    let tagged = hydrate(db, api, tagged).await?;

    Ok(TweetMention::from_thread(tagged, hydrated_parents))
}
