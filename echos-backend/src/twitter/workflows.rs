//! Mentions and followers cycles, plus the operator-triggered forced reply.

use chrono::{DateTime, Utc};

use super::agent::ReplyGuyAgent;
use super::pipeline::{
    db_err, get_all_follower_tweets, get_author_recent_tweets, get_tweet, get_user_ids_from_usernames,
    get_user_mentions,
};
use super::poster::{post_tweet_response, DispatchOutcome, ReplyTarget};
use super::reply_filter::should_reply_to_mention;
use super::thread::build_mention;
use super::types::{FollowerTweet, TweetMention};
use crate::ai::{ConversationSource, ReplyContext};
use crate::models::{Tweet, TweetId, UserId};

/// Fetch new mentions and answer the ones worth answering.
///
/// Returns the number of responses posted. A failure to resolve the agent or
/// to fetch mentions aborts the cycle before the checkpoint moves.
pub async fn run_mentions_cycle(agent: &ReplyGuyAgent, start_time: DateTime<Utc>) -> Result<usize, String> {
    let agent_id = agent.user_id().await?;
    let mentions = get_user_mentions(
        &agent.db,
        agent.twitter.as_ref(),
        agent.name(),
        agent_id,
        Some(start_time),
    )
    .await?;
    if mentions.is_empty() {
        return Ok(0);
    }
    log::info!("Twitter: Processing {} new mentions for @{}", mentions.len(), agent.handle());
    Ok(reply_to_mentions(agent, agent_id, mentions).await)
}

/// Process mentions in order. A failing mention is logged and skipped.
pub async fn reply_to_mentions(agent: &ReplyGuyAgent, agent_id: UserId, mentions: Vec<Tweet>) -> usize {
    let mut posted = 0;
    for tweet in mentions {
        let tweet_id = tweet.id;
        match process_mention(agent, agent_id, tweet).await {
            Ok(Some(response_id)) => {
                log::info!("Twitter: Replied to mention {} with {}", tweet_id, response_id);
                posted += 1;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Twitter: Failed to process mention {}: {}", tweet_id, e),
        }
    }
    posted
}

async fn process_mention(agent: &ReplyGuyAgent, agent_id: UserId, tweet: Tweet) -> Result<Option<TweetId>, String> {
    if tweet.author_id == agent_id {
        return Ok(None);
    }
    if agent.db.has_replied_to(agent.name(), tweet.id).map_err(db_err)? {
        log::debug!("Twitter: Already replied to {}, skipping", tweet.id);
        return Ok(None);
    }

    let mention = build_mention(&agent.db, agent.twitter.as_ref(), tweet).await?;
    if !should_reply_to_mention(agent.handle(), &mention) {
        log::debug!(
            "Twitter: Not replying to {} ({})",
            mention.tagged_tweet.tweet.id,
            mention.mention_type().as_ref()
        );
        return Ok(None);
    }
    respond_to_mention(agent, &mention).await
}

async fn author_history(agent: &ReplyGuyAgent, author_id: UserId) -> Result<Vec<String>, String> {
    let tweets = get_author_recent_tweets(&agent.db, agent.twitter.as_ref(), author_id).await?;
    Ok(tweets.into_iter().map(|t| t.text).collect())
}

/// Score a mention and dispatch the result with the mentions threshold.
///
/// Replies go to the tagged tweet, quotes embed the root tweet. A posted
/// response is recorded against the tagged tweet.
pub async fn respond_to_mention(agent: &ReplyGuyAgent, mention: &TweetMention) -> Result<Option<TweetId>, String> {
    let root = mention.root_tweet();
    let context = ReplyContext {
        source: ConversationSource::Mention(mention.mention_type()),
        author_username: root.username.clone(),
        conversation_summary: mention.to_prompt_summary(),
        author_history: author_history(agent, root.tweet.author_id).await?,
    };

    let tagged = &mention.tagged_tweet.tweet;
    let Some(evaluation) = agent.generator.score(&agent.profile, &context).await? else {
        log::info!("Twitter: No evaluation for mention {}", tagged.id);
        return Ok(None);
    };

    let target = ReplyTarget {
        conversation_id: tagged.conversation_id,
        reply_to_tweet_id: tagged.id,
        quote_tweet_id: root.tweet.id,
    };
    let outcome = post_tweet_response(
        agent,
        &evaluation,
        agent.thresholds.meme,
        agent.thresholds.mentions,
        &target,
    )
    .await?;
    record_outcome(agent, tagged.id, outcome)
}

fn record_outcome(agent: &ReplyGuyAgent, source_id: TweetId, outcome: DispatchOutcome) -> Result<Option<TweetId>, String> {
    let Some(response_id) = outcome.tweet_id() else {
        return Ok(None);
    };
    agent
        .db
        .record_reply(agent.name(), source_id, response_id)
        .map_err(db_err)?;
    Ok(Some(response_id))
}

/// Fetch new original posts from followed accounts and answer some of them.
///
/// An unknown followed account or a fetch failure aborts the cycle.
pub async fn run_followers_cycle(agent: &ReplyGuyAgent, start_time: DateTime<Utc>) -> Result<usize, String> {
    let usernames = agent.profile.follower_usernames();
    if usernames.is_empty() {
        log::debug!("Twitter: No followed accounts configured for {}", agent.name());
        return Ok(0);
    }

    let followers = get_user_ids_from_usernames(&agent.db, agent.twitter.as_ref(), &usernames).await?;
    let tweets = get_all_follower_tweets(
        &agent.db,
        agent.twitter.as_ref(),
        agent.name(),
        &followers,
        Some(start_time),
    )
    .await?;
    if tweets.is_empty() {
        return Ok(0);
    }
    log::info!("Twitter: Processing {} new tweets from followed accounts", tweets.len());
    Ok(reply_to_followers(agent, tweets).await)
}

/// Answer follower tweets, each gated by that follower's reply probability.
pub async fn reply_to_followers(agent: &ReplyGuyAgent, tweets: Vec<FollowerTweet>) -> usize {
    let mut posted = 0;
    for follower_tweet in tweets {
        let tweet_id = follower_tweet.tweet.id;
        match process_follower_tweet(agent, &follower_tweet).await {
            Ok(Some(response_id)) => {
                log::info!(
                    "Twitter: Replied to @{} tweet {} with {}",
                    follower_tweet.username,
                    tweet_id,
                    response_id
                );
                posted += 1;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Twitter: Failed to process follower tweet {}: {}", tweet_id, e),
        }
    }
    posted
}

async fn process_follower_tweet(agent: &ReplyGuyAgent, follower_tweet: &FollowerTweet) -> Result<Option<TweetId>, String> {
    let tweet = &follower_tweet.tweet;
    if agent.db.has_replied_to(agent.name(), tweet.id).map_err(db_err)? {
        return Ok(None);
    }

    let draw = agent.sample();
    let probability = agent.profile.reply_probability(&follower_tweet.username);
    if draw > probability {
        log::debug!(
            "Twitter: Skipping @{} tweet {} (draw {:.2} > {:.2})",
            follower_tweet.username,
            tweet.id,
            draw,
            probability
        );
        return Ok(None);
    }

    let context = ReplyContext {
        source: ConversationSource::Follower,
        author_username: follower_tweet.username.clone(),
        conversation_summary: follower_tweet.to_prompt_summary(),
        author_history: author_history(agent, tweet.author_id).await?,
    };
    let Some(evaluation) = agent.generator.score(&agent.profile, &context).await? else {
        log::info!("Twitter: No evaluation for follower tweet {}", tweet.id);
        return Ok(None);
    };

    let target = ReplyTarget {
        conversation_id: tweet.conversation_id,
        reply_to_tweet_id: tweet.id,
        quote_tweet_id: tweet.id,
    };
    let outcome = post_tweet_response(
        agent,
        &evaluation,
        agent.thresholds.meme,
        agent.thresholds.followers,
        &target,
    )
    .await?;
    record_outcome(agent, tweet.id, outcome)
}

/// Reply to one tweet on request, regardless of the reply heuristic or
/// earlier replies. `Ok(None)` when the evaluation did not warrant a post.
pub async fn reply_to_tweet(agent: &ReplyGuyAgent, tweet_id: TweetId) -> Result<Option<TweetId>, String> {
    let tweet = get_tweet(&agent.db, agent.twitter.as_ref(), tweet_id)
        .await?
        .ok_or_else(|| format!("Tweet {} not found", tweet_id))?;
    let mention = build_mention(&agent.db, agent.twitter.as_ref(), tweet).await?;
    log::info!(
        "Twitter: Forced reply to {} ({})",
        tweet_id,
        mention.mention_type().as_ref()
    );
    respond_to_mention(agent, &mention).await
}
