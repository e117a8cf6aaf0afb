//! In-memory `TwitterApi` used by the pipeline tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::api::{NewTweet, TimelineQuery, TweetPage, TwitterApi};
use crate::models::{Tweet, TweetId, TweetType, TwitterUser, UserId};

/// Build a tweet whose `created_at` follows its id.
pub fn build_tweet(
    id: TweetId,
    author_id: UserId,
    conversation_id: TweetId,
    reply_to_id: Option<TweetId>,
    text: &str,
) -> Tweet {
    Tweet {
        id,
        text: text.to_string(),
        author_id,
        conversation_id,
        created_at: DateTime::<Utc>::from_timestamp(1_700_000_000 + id, 0).unwrap(),
        tweet_type: if reply_to_id.is_some() { TweetType::Reply } else { TweetType::Original },
        reply_to_id,
        quote_tweet_id: None,
        media_ids: vec![],
    }
}

pub fn build_user(user_id: UserId, username: &str) -> TwitterUser {
    TwitterUser {
        user_id,
        username: username.to_string(),
        followers_count: Some(100),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    UsersTweets(UserId, TimelineQuery),
    Mentions(UserId, TimelineQuery),
    GetTweet(TweetId),
    UserById(UserId),
    UserByUsername(String),
    CreateTweet(NewTweet),
    UploadImage(String),
}

#[derive(Default)]
pub struct MockTwitterApi {
    tweets: Mutex<HashMap<TweetId, Tweet>>,
    users: Mutex<HashMap<UserId, TwitterUser>>,
    mention_pages: Mutex<VecDeque<Result<TweetPage, String>>>,
    timeline_pages: Mutex<HashMap<UserId, VecDeque<Result<TweetPage, String>>>>,
    failing_posts: Mutex<Vec<String>>,
    fail_uploads: Mutex<bool>,
    next_post_id: Mutex<TweetId>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockTwitterApi {
    pub fn new() -> Self {
        let api = Self::default();
        *api.next_post_id.lock() = 9_000;
        api
    }

    /// Make a tweet retrievable via `get_tweet`.
    pub fn add_tweet(&self, tweet: Tweet) {
        self.tweets.lock().insert(tweet.id, tweet);
    }

    pub fn add_user(&self, user: TwitterUser) {
        self.users.lock().insert(user.user_id, user);
    }

    /// Queue the next mentions response; an exhausted queue returns empty pages.
    pub fn push_mentions(&self, page: Result<TweetPage, String>) {
        self.mention_pages.lock().push_back(page);
    }

    pub fn push_timeline(&self, user_id: UserId, page: Result<TweetPage, String>) {
        self.timeline_pages
            .lock()
            .entry(user_id)
            .or_default()
            .push_back(page);
    }

    /// Fail any post whose text contains `needle`.
    pub fn fail_posts_containing(&self, needle: &str) {
        self.failing_posts.lock().push(needle.to_string());
    }

    pub fn fail_uploads(&self) {
        *self.fail_uploads.lock() = true;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn posted(&self) -> Vec<NewTweet> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::CreateTweet(tweet) => Some(tweet.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn timeline_queries(&self) -> Vec<TimelineQuery> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::Mentions(_, q) | MockCall::UsersTweets(_, q) => Some(q.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn get_tweet_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, MockCall::GetTweet(_)))
            .count()
    }
}

#[async_trait]
impl TwitterApi for MockTwitterApi {
    async fn get_users_tweets(&self, user_id: UserId, query: &TimelineQuery) -> Result<TweetPage, String> {
        self.calls.lock().push(MockCall::UsersTweets(user_id, query.clone()));
        self.timeline_pages
            .lock()
            .get_mut(&user_id)
            .and_then(|pages| pages.pop_front())
            .unwrap_or_else(|| Ok(TweetPage::default()))
    }

    async fn get_users_mentions(&self, user_id: UserId, query: &TimelineQuery) -> Result<TweetPage, String> {
        self.calls.lock().push(MockCall::Mentions(user_id, query.clone()));
        self.mention_pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(TweetPage::default()))
    }

    async fn get_tweet(&self, tweet_id: TweetId) -> Result<TweetPage, String> {
        self.calls.lock().push(MockCall::GetTweet(tweet_id));
        let tweet = self.tweets.lock().get(&tweet_id).cloned();
        Ok(match tweet {
            Some(tweet) => {
                let users = self.users.lock().get(&tweet.author_id).cloned().into_iter().collect();
                TweetPage { tweets: vec![tweet], users }
            }
            None => TweetPage::default(),
        })
    }

    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<TwitterUser>, String> {
        self.calls.lock().push(MockCall::UserById(user_id));
        Ok(self.users.lock().get(&user_id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<TwitterUser>, String> {
        self.calls.lock().push(MockCall::UserByUsername(username.to_string()));
        Ok(self
            .users
            .lock()
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn create_tweet(&self, tweet: &NewTweet) -> Result<TweetId, String> {
        self.calls.lock().push(MockCall::CreateTweet(tweet.clone()));
        if self.failing_posts.lock().iter().any(|needle| tweet.text.contains(needle.as_str())) {
            return Err("API error (503 Service Unavailable): over capacity".to_string());
        }
        let mut next = self.next_post_id.lock();
        *next += 1;
        Ok(*next)
    }

    async fn upload_image_from_url(&self, image_url: &str) -> Result<String, String> {
        self.calls.lock().push(MockCall::UploadImage(image_url.to_string()));
        if *self.fail_uploads.lock() {
            return Err("Image download failed (404 Not Found)".to_string());
        }
        Ok("media-1".to_string())
    }
}

/// Agent "vader" (user 1) with quote probability 0.2, follower luke (0.5)
/// and sibling @chad_echos, drawing `roll` for every random decision.
pub fn build_test_agent(
    api: std::sync::Arc<MockTwitterApi>,
    generator: crate::ai::mock::MockResponseGenerator,
    memes: crate::ai::mock::MockMemeGenerator,
    roll: f64,
) -> super::agent::ReplyGuyAgent {
    use crate::models::{AgentProfile, FollowerSubscription, SiblingAgent};
    use std::sync::Arc;

    api.add_user(build_user(1, "vader"));
    let profile = AgentProfile {
        name: "vader".to_string(),
        twitter_handle: "vader".to_string(),
        quote_tweet_probability: 0.2,
        personality: String::new(),
        followers: vec![FollowerSubscription {
            username: "luke".to_string(),
            reply_probability: 0.5,
        }],
        sibling_agents: vec![SiblingAgent {
            handle: "chad_echos".to_string(),
            display_name: "Chad".to_string(),
        }],
    };
    super::agent::ReplyGuyAgent::new(
        Arc::new(crate::db::Database::new(":memory:").unwrap()),
        api,
        Arc::new(generator),
        Arc::new(memes),
        profile,
        crate::config::ReplyThresholds::default(),
    )
    .with_random_source(Arc::new(move || roll))
}
