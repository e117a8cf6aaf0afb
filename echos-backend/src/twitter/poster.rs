//! Response dispatch: turns an evaluation into a meme reply, a text reply,
//! a quote tweet, or nothing.

use chrono::Utc;

use super::agent::ReplyGuyAgent;
use super::api::NewTweet;
use super::helpers::{preview, scrub_sibling_handles};
use super::pipeline::db_err;
use crate::ai::ReplyEvaluation;
use crate::models::{Tweet, TweetId, TweetType};

/// How a new tweet relates to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Original,
    Reply {
        in_reply_to: TweetId,
        conversation_id: TweetId,
    },
    Quote {
        quote_tweet_id: TweetId,
    },
}

/// Tweets a response may attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub conversation_id: TweetId,
    pub reply_to_tweet_id: TweetId,
    pub quote_tweet_id: TweetId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Meme(TweetId),
    Reply(TweetId),
    Quote(TweetId),
    Skipped,
}

impl DispatchOutcome {
    pub fn tweet_id(&self) -> Option<TweetId> {
        match self {
            DispatchOutcome::Meme(id) | DispatchOutcome::Reply(id) | DispatchOutcome::Quote(id) => Some(*id),
            DispatchOutcome::Skipped => None,
        }
    }
}

/// Post a tweet as the agent and record it in the store.
pub async fn post_tweet(
    agent: &ReplyGuyAgent,
    text: &str,
    kind: PostKind,
    media_ids: Vec<String>,
) -> Result<TweetId, String> {
    let text = scrub_sibling_handles(text, &agent.profile.sibling_agents);
    let (in_reply_to_tweet_id, quote_tweet_id) = match kind {
        PostKind::Original => (None, None),
        PostKind::Reply { in_reply_to, .. } => (Some(in_reply_to), None),
        PostKind::Quote { quote_tweet_id } => (None, Some(quote_tweet_id)),
    };
    let request = NewTweet {
        text: text.clone(),
        in_reply_to_tweet_id,
        quote_tweet_id,
        media_ids,
    };

    let agent_id = agent.user_id().await?;
    let tweet_id = agent.twitter.create_tweet(&request).await?;
    log::info!("Twitter: Posted tweet {} - {}", tweet_id, preview(&text, 50));

    let (tweet_type, conversation_id) = match kind {
        PostKind::Original => (TweetType::Original, tweet_id),
        PostKind::Reply { conversation_id, .. } => (TweetType::Reply, conversation_id),
        PostKind::Quote { .. } => (TweetType::Quote, tweet_id),
    };
    let tweet = Tweet {
        id: tweet_id,
        text,
        author_id: agent_id,
        conversation_id,
        created_at: Utc::now(),
        tweet_type,
        reply_to_id: in_reply_to_tweet_id,
        quote_tweet_id,
        media_ids: request.media_ids,
    };
    agent.db.upsert_tweet(&tweet).map_err(db_err)?;
    Ok(tweet_id)
}

/// Reply with an image. `Ok(None)` when the image could not be uploaded.
pub async fn reply_to_tweet_with_image(
    agent: &ReplyGuyAgent,
    image_url: &str,
    conversation_id: TweetId,
    reply_to_id: TweetId,
) -> Result<Option<TweetId>, String> {
    let media_id = match agent.twitter.upload_image_from_url(image_url).await {
        Ok(media_id) => media_id,
        Err(e) => {
            log::warn!("Twitter: Failed to upload {}: {}", image_url, e);
            return Ok(None);
        }
    };
    let kind = PostKind::Reply {
        in_reply_to: reply_to_id,
        conversation_id,
    };
    post_tweet(agent, "", kind, vec![media_id]).await.map(Some)
}

/// Decide how (and whether) to post an evaluation.
///
/// A meme rating at or above `meme_threshold` tries an image reply first; any
/// failure to produce or upload the image falls back to text. Text is posted
/// only when the response rating reaches `text_threshold`, as a quote tweet
/// with the profile's quote probability and as a reply otherwise.
pub async fn post_tweet_response(
    agent: &ReplyGuyAgent,
    evaluation: &ReplyEvaluation,
    meme_threshold: u8,
    text_threshold: u8,
    target: &ReplyTarget,
) -> Result<DispatchOutcome, String> {
    if evaluation.meme_rating >= meme_threshold {
        log::info!(
            "Twitter: Meme rating {} >= {}, generating meme",
            evaluation.meme_rating,
            meme_threshold
        );
        match agent.memes.caption(evaluation).await {
            Ok(Some(image)) => {
                log::info!(
                    "Twitter: Meme ready {}",
                    image.page_url.as_deref().unwrap_or(&image.url)
                );
                let posted = reply_to_tweet_with_image(
                    agent,
                    &image.url,
                    target.conversation_id,
                    target.reply_to_tweet_id,
                )
                .await?;
                if let Some(tweet_id) = posted {
                    return Ok(DispatchOutcome::Meme(tweet_id));
                }
            }
            Ok(None) => log::info!("Twitter: No meme produced, falling back to text"),
            Err(e) => log::warn!("Twitter: Meme generation failed, falling back to text: {}", e),
        }
    }

    if evaluation.response_rating < text_threshold {
        log::info!(
            "Twitter: Response rating {} below {}, not posting",
            evaluation.response_rating,
            text_threshold
        );
        return Ok(DispatchOutcome::Skipped);
    }

    if agent.sample() < agent.profile.quote_tweet_probability {
        let kind = PostKind::Quote {
            quote_tweet_id: target.quote_tweet_id,
        };
        let tweet_id = post_tweet(agent, &evaluation.response, kind, vec![]).await?;
        return Ok(DispatchOutcome::Quote(tweet_id));
    }

    let kind = PostKind::Reply {
        in_reply_to: target.reply_to_tweet_id,
        conversation_id: target.conversation_id,
    };
    let tweet_id = post_tweet(agent, &evaluation.response, kind, vec![]).await?;
    Ok(DispatchOutcome::Reply(tweet_id))
}
