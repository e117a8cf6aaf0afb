//! Incremental ingestion: checkpointed timeline fetches, user resolution and
//! store-first tweet lookup.

use chrono::{DateTime, Utc};

use super::api::{TimelineQuery, TweetPage, TwitterApi};
use super::helpers::{filter_tweet_exclusions, TweetExclusion};
use super::types::FollowerTweet;
use crate::db::Database;
use crate::models::{QueryType, Tweet, TweetId, TwitterUser, UserId};

/// Page size requested from timeline endpoints. A shorter page ends pagination.
pub const TIMELINE_BATCH_SIZE: u32 = 100;

/// Authors with at least this many followers get a longer history in prompts.
const POPULAR_AUTHOR_FOLLOWERS: u64 = 1000;
const POPULAR_AUTHOR_HISTORY: u32 = 15;
const DEFAULT_AUTHOR_HISTORY: u32 = 5;

/// Follower tweets that are replies, quotes or retweets are not answered.
pub const FOLLOWER_EXCLUSIONS: [TweetExclusion; 3] = [
    TweetExclusion::Replies,
    TweetExclusion::QuoteTweets,
    TweetExclusion::Retweets,
];

pub(crate) fn db_err(e: rusqlite::Error) -> String {
    format!("Database error: {}", e)
}

/// Username used when an author cannot be resolved at all.
pub fn placeholder_username(user_id: UserId) -> String {
    format!("user_{}", user_id)
}

pub async fn get_user_id_from_username(
    db: &Database,
    api: &dyn TwitterApi,
    username: &str,
) -> Result<Option<UserId>, String> {
    let username = username.trim_start_matches('@');
    if let Some(user) = db.get_twitter_user_by_username(username).map_err(db_err)? {
        return Ok(Some(user.user_id));
    }
    match api.get_user_by_username(username).await? {
        Some(user) => {
            db.upsert_twitter_user(&user).map_err(db_err)?;
            Ok(Some(user.user_id))
        }
        None => Ok(None),
    }
}

pub async fn require_user_id_from_username(
    db: &Database,
    api: &dyn TwitterApi,
    username: &str,
) -> Result<UserId, String> {
    get_user_id_from_username(db, api, username)
        .await?
        .ok_or_else(|| format!("Twitter user @{} not found", username.trim_start_matches('@')))
}

/// Resolve a handle via the store, then the platform, then a placeholder.
pub async fn get_username_from_user_id(
    db: &Database,
    api: &dyn TwitterApi,
    user_id: UserId,
) -> Result<String, String> {
    if let Some(user) = db.get_twitter_user(user_id).map_err(db_err)? {
        return Ok(user.username);
    }
    match api.get_user_by_id(user_id).await? {
        Some(user) => {
            db.upsert_twitter_user(&user).map_err(db_err)?;
            Ok(user.username)
        }
        None => {
            log::warn!("Twitter: Could not resolve user {}, using placeholder", user_id);
            Ok(placeholder_username(user_id))
        }
    }
}

/// Make sure the author of a tweet exists in the store before the tweet does.
async fn ensure_author(
    db: &Database,
    api: &dyn TwitterApi,
    page: &TweetPage,
    author_id: UserId,
) -> Result<(), String> {
    if page.user(author_id).is_some() || db.get_twitter_user(author_id).map_err(db_err)?.is_some() {
        return Ok(());
    }
    let user = match api.get_user_by_id(author_id).await? {
        Some(user) => user,
        None => {
            log::warn!("Twitter: Author {} not found, storing placeholder", author_id);
            TwitterUser {
                user_id: author_id,
                username: placeholder_username(author_id),
                followers_count: None,
            }
        }
    };
    db.upsert_twitter_user(&user).map_err(db_err)
}

/// Upsert every user and tweet in a page. Re-storing a page is a no-op.
pub async fn store_page(db: &Database, api: &dyn TwitterApi, page: &TweetPage) -> Result<(), String> {
    for user in &page.users {
        db.upsert_twitter_user(user).map_err(db_err)?;
    }
    for tweet in &page.tweets {
        ensure_author(db, api, page, tweet.author_id).await?;
        db.upsert_tweet(tweet).map_err(db_err)?;
    }
    Ok(())
}

/// Look a tweet up in the store, falling back to the platform.
/// Anything fetched is stored before it is returned.
pub async fn get_tweet(db: &Database, api: &dyn TwitterApi, tweet_id: TweetId) -> Result<Option<Tweet>, String> {
    if let Some(tweet) = db.get_tweet(tweet_id).map_err(db_err)? {
        return Ok(Some(tweet));
    }
    let page = api.get_tweet(tweet_id).await?;
    store_page(db, api, &page).await?;
    Ok(page.tweets.into_iter().find(|t| t.id == tweet_id))
}

async fn fetch_page(
    api: &dyn TwitterApi,
    query_type: QueryType,
    user_id: UserId,
    query: &TimelineQuery,
) -> Result<TweetPage, String> {
    match query_type {
        QueryType::UserTweets => api.get_users_tweets(user_id, query).await,
        QueryType::UserMentions => api.get_users_mentions(user_id, query).await,
    }
}

/// Fetch everything newer than `since_id` (or `since_time` when there is no id).
///
/// Batches of `batch_size` are requested, each bounded below by the newest id
/// of the previous batch, until a short or empty batch comes back. The merged
/// result is sorted by `created_at`, ties kept in fetch order.
pub async fn fetch_timeline_since(
    api: &dyn TwitterApi,
    query_type: QueryType,
    user_id: UserId,
    since_id: Option<TweetId>,
    since_time: Option<DateTime<Utc>>,
    batch_size: u32,
) -> Result<TweetPage, String> {
    let mut merged = TweetPage::default();
    let mut query = TimelineQuery {
        since_id,
        since_time: if since_id.is_none() { since_time } else { None },
        max_results: Some(batch_size),
    };

    loop {
        let page = fetch_page(api, query_type, user_id, &query).await?;
        let Some(newest) = page.newest_id() else {
            break;
        };
        let count = page.tweets.len();

        merged.tweets.extend(page.tweets);
        for user in page.users {
            if merged.user(user.user_id).is_none() {
                merged.users.push(user);
            }
        }

        if count < batch_size as usize || query.since_id.is_some_and(|prev| newest <= prev) {
            break;
        }
        query.since_id = Some(newest);
        query.since_time = None;
    }

    merged.tweets.sort_by_key(|t| t.created_at);
    Ok(merged)
}

/// Tweets fetched and stored for one timeline, with the checkpoint not yet moved.
#[derive(Debug)]
pub struct PendingTimeline {
    pub user_id: UserId,
    pub query_type: QueryType,
    pub tweets: Vec<Tweet>,
    newest: Option<TweetId>,
}

impl PendingTimeline {
    /// Advance the checkpoint past everything fetched. An empty fetch leaves it untouched.
    pub fn commit(&self, db: &Database, agent_name: &str) -> Result<(), String> {
        let Some(newest) = self.newest else {
            return Ok(());
        };
        db.advance_checkpoint(agent_name, self.user_id, self.query_type, newest)
            .map_err(db_err)?;
        log::info!(
            "Twitter: Ingested {} {} for user {} (checkpoint {})",
            self.tweets.len(),
            self.query_type.as_ref(),
            self.user_id,
            newest
        );
        Ok(())
    }
}

/// Fetch and store everything newer than the checkpoint without advancing it.
pub async fn fetch_new_tweets(
    db: &Database,
    api: &dyn TwitterApi,
    agent_name: &str,
    user_id: UserId,
    query_type: QueryType,
    since_time: Option<DateTime<Utc>>,
) -> Result<PendingTimeline, String> {
    let checkpoint = db
        .get_checkpoint(agent_name, user_id, query_type)
        .map_err(db_err)?;
    let since_id = checkpoint.as_ref().map(|cp| cp.last_tweet_id);

    let page = fetch_timeline_since(api, query_type, user_id, since_id, since_time, TIMELINE_BATCH_SIZE).await?;
    let newest = page.newest_id();
    if newest.is_none() {
        log::debug!("Twitter: No new {} for user {}", query_type.as_ref(), user_id);
    } else {
        store_page(db, api, &page).await?;
    }

    Ok(PendingTimeline {
        user_id,
        query_type,
        tweets: page.tweets,
        newest,
    })
}

/// Checkpointed fetch of one timeline.
///
/// New tweets and their authors are stored, then the checkpoint advances to
/// the newest id seen. An empty result leaves the checkpoint untouched.
pub async fn get_new_tweets(
    db: &Database,
    api: &dyn TwitterApi,
    agent_name: &str,
    user_id: UserId,
    query_type: QueryType,
    since_time: Option<DateTime<Utc>>,
) -> Result<Vec<Tweet>, String> {
    let pending = fetch_new_tweets(db, api, agent_name, user_id, query_type, since_time).await?;
    pending.commit(db, agent_name)?;
    Ok(pending.tweets)
}

pub async fn get_user_mentions(
    db: &Database,
    api: &dyn TwitterApi,
    agent_name: &str,
    agent_user_id: UserId,
    since_time: Option<DateTime<Utc>>,
) -> Result<Vec<Tweet>, String> {
    get_new_tweets(db, api, agent_name, agent_user_id, QueryType::UserMentions, since_time).await
}

/// Resolve every followed username, in order. Any unknown account is an error.
pub async fn get_user_ids_from_usernames(
    db: &Database,
    api: &dyn TwitterApi,
    usernames: &[String],
) -> Result<Vec<(String, UserId)>, String> {
    let mut resolved = Vec::with_capacity(usernames.len());
    for username in usernames {
        let user_id = require_user_id_from_username(db, api, username).await?;
        resolved.push((username.trim_start_matches('@').to_string(), user_id));
    }
    Ok(resolved)
}

/// New original tweets from every followed account, in configured order.
///
/// Every account is fetched before any checkpoint moves, so a failure on one
/// account leaves all of them to be retried on the next cycle.
pub async fn get_all_follower_tweets(
    db: &Database,
    api: &dyn TwitterApi,
    agent_name: &str,
    followers: &[(String, UserId)],
    since_time: Option<DateTime<Utc>>,
) -> Result<Vec<FollowerTweet>, String> {
    let mut pending = Vec::with_capacity(followers.len());
    for (username, user_id) in followers {
        let timeline = fetch_new_tweets(db, api, agent_name, *user_id, QueryType::UserTweets, since_time).await?;
        pending.push((username, timeline));
    }

    let mut follower_tweets = Vec::new();
    for (username, timeline) in pending {
        timeline.commit(db, agent_name)?;
        let tweets = filter_tweet_exclusions(timeline.tweets, &FOLLOWER_EXCLUSIONS);
        follower_tweets.extend(tweets.into_iter().map(|tweet| FollowerTweet {
            tweet,
            username: username.clone(),
        }));
    }
    Ok(follower_tweets)
}

/// Recent tweets by an author, used as style context for replies.
/// Not checkpointed and not stored. When the platform has nothing (or fails),
/// the author's stored tweets are used instead.
pub async fn get_author_recent_tweets(
    db: &Database,
    api: &dyn TwitterApi,
    author_id: UserId,
) -> Result<Vec<Tweet>, String> {
    let followers_count = match db.get_twitter_user(author_id).map_err(db_err)? {
        Some(TwitterUser { followers_count: Some(count), .. }) => count,
        _ => api
            .get_user_by_id(author_id)
            .await?
            .and_then(|u| u.followers_count)
            .unwrap_or(0),
    };
    let limit = if followers_count >= POPULAR_AUTHOR_FOLLOWERS {
        POPULAR_AUTHOR_HISTORY
    } else {
        DEFAULT_AUTHOR_HISTORY
    };
    let query = TimelineQuery {
        max_results: Some(limit),
        ..Default::default()
    };
    let tweets = match api.get_users_tweets(author_id, &query).await {
        Ok(page) if !page.tweets.is_empty() => page.tweets,
        Ok(_) => db.get_tweets_by_author(author_id, limit as usize).map_err(db_err)?,
        Err(e) => {
            log::warn!("Twitter: Falling back to stored history for {}: {}", author_id, e);
            db.get_tweets_by_author(author_id, limit as usize).map_err(db_err)?
        }
    };
    Ok(tweets.into_iter().take(limit as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TweetType;
    use crate::twitter::mock::{build_tweet, build_user, MockCall, MockTwitterApi};

    const AGENT: &str = "vader";
    const BOT_ID: UserId = 1;

    fn page(tweets: Vec<Tweet>, users: Vec<TwitterUser>) -> TweetPage {
        TweetPage { tweets, users }
    }

    fn start_time() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_run_uses_since_time_and_creates_checkpoint() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        api.push_mentions(Ok(page(
            vec![build_tweet(12, 2, 12, None, "@vader hi"), build_tweet(11, 3, 11, None, "@vader yo")],
            vec![build_user(2, "luke"), build_user(3, "leia")],
        )));

        let tweets = get_user_mentions(&db, &api, AGENT, BOT_ID, Some(start_time())).await.unwrap();

        assert_eq!(tweets.iter().map(|t| t.id).collect::<Vec<_>>(), vec![11, 12]);
        let queries = api.timeline_queries();
        assert_eq!(queries[0].since_id, None);
        assert_eq!(queries[0].since_time, Some(start_time()));

        let cp = db.get_checkpoint(AGENT, BOT_ID, QueryType::UserMentions).unwrap().unwrap();
        assert_eq!(cp.last_tweet_id, 12);
        assert!(db.get_tweet(11).unwrap().is_some());
        assert_eq!(db.get_twitter_user(3).unwrap().unwrap().username, "leia");
    }

    #[tokio::test]
    async fn test_existing_checkpoint_ignores_since_time() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        db.advance_checkpoint(AGENT, BOT_ID, QueryType::UserMentions, 50).unwrap();

        let tweets = get_user_mentions(&db, &api, AGENT, BOT_ID, Some(start_time())).await.unwrap();

        assert!(tweets.is_empty());
        let queries = api.timeline_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].since_id, Some(50));
        assert_eq!(queries[0].since_time, None);
        let cp = db.get_checkpoint(AGENT, BOT_ID, QueryType::UserMentions).unwrap().unwrap();
        assert_eq!(cp.last_tweet_id, 50);
    }

    #[tokio::test]
    async fn test_empty_result_creates_no_checkpoint() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();

        let tweets = get_user_mentions(&db, &api, AGENT, BOT_ID, None).await.unwrap();

        assert!(tweets.is_empty());
        assert!(db.get_checkpoint(AGENT, BOT_ID, QueryType::UserMentions).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pagination_stops_on_short_batch() {
        let api = MockTwitterApi::new();
        let users = vec![build_user(2, "luke")];
        api.push_mentions(Ok(page(
            vec![build_tweet(13, 2, 13, None, "c"), build_tweet(12, 2, 12, None, "b")],
            users.clone(),
        )));
        api.push_mentions(Ok(page(
            vec![build_tweet(15, 2, 15, None, "e"), build_tweet(14, 2, 14, None, "d")],
            users.clone(),
        )));
        api.push_mentions(Ok(page(vec![build_tweet(16, 2, 16, None, "f")], users)));

        let merged = fetch_timeline_since(&api, QueryType::UserMentions, BOT_ID, Some(10), None, 2)
            .await
            .unwrap();

        assert_eq!(merged.tweets.iter().map(|t| t.id).collect::<Vec<_>>(), vec![12, 13, 14, 15, 16]);
        assert_eq!(merged.users.len(), 1);
        let since: Vec<_> = api.timeline_queries().iter().map(|q| q.since_id).collect();
        assert_eq!(since, vec![Some(10), Some(13), Some(15)]);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_checkpoint_alone() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        db.advance_checkpoint(AGENT, BOT_ID, QueryType::UserMentions, 50).unwrap();
        api.push_mentions(Err("API error (429 Too Many Requests): slow down".to_string()));

        assert!(get_user_mentions(&db, &api, AGENT, BOT_ID, None).await.is_err());
        let cp = db.get_checkpoint(AGENT, BOT_ID, QueryType::UserMentions).unwrap().unwrap();
        assert_eq!(cp.last_tweet_id, 50);
    }

    #[tokio::test]
    async fn test_unknown_author_gets_placeholder() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        store_page(&db, &api, &page(vec![build_tweet(5, 77, 5, None, "hi")], vec![])).await.unwrap();

        assert_eq!(db.get_twitter_user(77).unwrap().unwrap().username, "user_77");
        assert!(db.get_tweet(5).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_username_resolution_prefers_store() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        api.add_user(build_user(2, "luke"));

        assert_eq!(get_username_from_user_id(&db, &api, 2).await.unwrap(), "luke");
        assert_eq!(get_username_from_user_id(&db, &api, 2).await.unwrap(), "luke");
        let lookups = api.calls().iter().filter(|c| matches!(c, MockCall::UserById(2))).count();
        assert_eq!(lookups, 1);

        assert_eq!(get_username_from_user_id(&db, &api, 3).await.unwrap(), "user_3");
        assert_eq!(get_user_id_from_username(&db, &api, "@LUKE").await.unwrap(), Some(2));
        assert!(require_user_id_from_username(&db, &api, "nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_get_tweet_stores_platform_result() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        api.add_user(build_user(2, "luke"));
        api.add_tweet(build_tweet(5, 2, 5, None, "hello"));

        assert_eq!(get_tweet(&db, &api, 5).await.unwrap().unwrap().text, "hello");
        assert_eq!(get_tweet(&db, &api, 5).await.unwrap().unwrap().text, "hello");
        assert_eq!(api.get_tweet_calls(), 1);

        assert!(get_tweet(&db, &api, 6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_follower_tweets_exclude_replies_quotes_retweets() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        api.add_user(build_user(2, "luke"));

        let mut quote = build_tweet(22, 2, 22, None, "quote");
        quote.tweet_type = TweetType::Quote;
        let mut retweet = build_tweet(23, 2, 23, None, "RT");
        retweet.tweet_type = TweetType::Retweet;
        api.push_timeline(
            2,
            Ok(page(
                vec![
                    build_tweet(24, 2, 24, None, "original"),
                    retweet,
                    quote,
                    build_tweet(21, 2, 5, Some(5), "reply"),
                ],
                vec![build_user(2, "luke")],
            )),
        );

        let followers = get_user_ids_from_usernames(&db, &api, &["@luke".to_string()]).await.unwrap();
        assert_eq!(followers, vec![("luke".to_string(), 2)]);
        let tweets = get_all_follower_tweets(&db, &api, AGENT, &followers, Some(start_time()))
            .await
            .unwrap();

        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0].tweet.id, 24);
        assert_eq!(tweets[0].username, "luke");
        let cp = db.get_checkpoint(AGENT, 2, QueryType::UserTweets).unwrap().unwrap();
        assert_eq!(cp.last_tweet_id, 24);
    }

    #[tokio::test]
    async fn test_follower_fetch_failure_moves_no_checkpoint() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        api.add_user(build_user(2, "luke"));
        api.add_user(build_user(3, "han"));
        let luke_page = || Ok(page(vec![build_tweet(300, 2, 300, None, "original")], vec![build_user(2, "luke")]));
        api.push_timeline(2, luke_page());
        api.push_timeline(3, Err("API error (503): down".to_string()));
        api.push_timeline(2, luke_page());

        let followers = vec![("luke".to_string(), 2), ("han".to_string(), 3)];
        let result = get_all_follower_tweets(&db, &api, AGENT, &followers, Some(start_time())).await;

        assert!(result.is_err());
        assert!(db.get_checkpoint(AGENT, 2, QueryType::UserTweets).unwrap().is_none());
        assert!(db.get_checkpoint(AGENT, 3, QueryType::UserTweets).unwrap().is_none());

        let tweets = get_all_follower_tweets(&db, &api, AGENT, &followers, Some(start_time()))
            .await
            .unwrap();
        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0].tweet.id, 300);
        let cp = db.get_checkpoint(AGENT, 2, QueryType::UserTweets).unwrap().unwrap();
        assert_eq!(cp.last_tweet_id, 300);
        assert!(db.get_checkpoint(AGENT, 3, QueryType::UserTweets).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_follower_is_an_error() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        api.add_user(build_user(2, "luke"));

        let result =
            get_user_ids_from_usernames(&db, &api, &["luke".to_string(), "ghost".to_string()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_author_history_depends_on_followers() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        db.upsert_twitter_user(&TwitterUser { user_id: 2, username: "big".into(), followers_count: Some(5000) })
            .unwrap();
        api.add_user(TwitterUser { user_id: 3, username: "small".into(), followers_count: Some(10) });

        get_author_recent_tweets(&db, &api, 2).await.unwrap();
        get_author_recent_tweets(&db, &api, 3).await.unwrap();

        let limits: Vec<_> = api.timeline_queries().iter().map(|q| q.max_results).collect();
        assert_eq!(limits, vec![Some(15), Some(5)]);
        assert!(db.get_checkpoint(AGENT, 2, QueryType::UserTweets).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_author_history_falls_back_to_store() {
        let db = Database::new(":memory:").unwrap();
        let api = MockTwitterApi::new();
        db.upsert_twitter_user(&TwitterUser { user_id: 2, username: "luke".into(), followers_count: Some(10) })
            .unwrap();
        for id in 1..=7 {
            db.upsert_tweet(&build_tweet(id, 2, id, None, "stored")).unwrap();
        }

        let from_empty = get_author_recent_tweets(&db, &api, 2).await.unwrap();
        let ids: Vec<TweetId> = from_empty.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![7, 6, 5, 4, 3]);

        api.push_timeline(2, Err("API error (429 Too Many Requests)".to_string()));
        let from_error = get_author_recent_tweets(&db, &api, 2).await.unwrap();
        assert_eq!(from_error.len(), 5);

        api.push_timeline(2, Ok(page(vec![build_tweet(50, 2, 50, None, "live")], vec![])));
        let live = get_author_recent_tweets(&db, &api, 2).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, 50);
    }
}
