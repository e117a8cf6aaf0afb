//! X API v2 client (v1.1 for media upload), authenticated with OAuth 1.0a.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use super::api::{NewTweet, TimelineQuery, TweetPage, TwitterApi};
use super::oauth::{generate_oauth_header, percent_encode, TwitterCredentials};
use crate::models::{Tweet, TweetId, TweetType, TwitterUser, UserId};

/// Twitter API v2 base URL
const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

const TWEET_FIELDS: &str = "created_at,author_id,conversation_id,referenced_tweets,attachments";
const USER_FIELDS: &str = "public_metrics";

/// The timeline endpoints reject page sizes outside this range.
const MIN_PAGE_SIZE: u32 = 5;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    data: Option<Vec<ApiTweet>>,
    includes: Option<Includes>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct SingleTweetResponse {
    data: Option<ApiTweet>,
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    conversation_id: Option<String>,
    created_at: Option<String>,
    referenced_tweets: Option<Vec<ReferencedTweet>>,
    attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    ref_type: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    media_keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    users: Option<Vec<ApiUser>>,
}

#[derive(Debug, Deserialize)]
struct SingleUserResponse {
    data: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    followers_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TwitterApiError {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
struct PostTweetResponse {
    data: Option<PostedTweet>,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

/// Rate limit information from Twitter API response headers
#[derive(Debug, Clone, Default)]
struct RateLimitInfo {
    remaining: Option<u32>,
    reset_at: Option<u64>,
}

impl RateLimitInfo {
    fn from_response(response: &reqwest::Response) -> Self {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        Self {
            remaining: header("x-rate-limit-remaining").and_then(|v| v.parse().ok()),
            reset_at: header("x-rate-limit-reset").and_then(|v| v.parse().ok()),
        }
    }

    fn seconds_until_reset(&self) -> Option<u64> {
        self.reset_at.map(|reset| {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            reset.saturating_sub(now)
        })
    }
}

fn parse_id(value: &str, what: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .map_err(|e| format!("Invalid {} '{}': {}", what, value, e))
}

impl ApiTweet {
    fn into_tweet(self) -> Result<Tweet, String> {
        let id = parse_id(&self.id, "tweet id")?;
        let author_id = match self.author_id.as_deref() {
            Some(author) => parse_id(author, "author id")?,
            None => return Err(format!("Tweet {} has no author_id", id)),
        };
        let conversation_id = match self.conversation_id.as_deref() {
            Some(conversation) => parse_id(conversation, "conversation id")?,
            None => id,
        };
        let created_at = self
            .created_at
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let mut tweet_type = TweetType::Original;
        let mut reply_to_id = None;
        let mut quote_tweet_id = None;
        for reference in self.referenced_tweets.unwrap_or_default() {
            let ref_id = parse_id(&reference.id, "referenced tweet id")?;
            match reference.ref_type.as_str() {
                "replied_to" => {
                    reply_to_id = Some(ref_id);
                    tweet_type = TweetType::Reply;
                }
                "quoted" => {
                    quote_tweet_id = Some(ref_id);
                    if tweet_type == TweetType::Original {
                        tweet_type = TweetType::Quote;
                    }
                }
                "retweeted" => tweet_type = TweetType::Retweet,
                other => log::debug!("Twitter: Ignoring reference type '{}' on {}", other, id),
            }
        }

        Ok(Tweet {
            id,
            text: self.text,
            author_id,
            conversation_id,
            created_at,
            tweet_type,
            reply_to_id,
            quote_tweet_id,
            media_ids: self
                .attachments
                .and_then(|a| a.media_keys)
                .unwrap_or_default(),
        })
    }
}

impl ApiUser {
    fn into_user(self) -> Result<TwitterUser, String> {
        Ok(TwitterUser {
            user_id: parse_id(&self.id, "user id")?,
            username: self.username,
            followers_count: self.public_metrics.and_then(|m| m.followers_count),
        })
    }
}

fn into_page(data: Vec<ApiTweet>, includes: Option<Includes>) -> Result<TweetPage, String> {
    let tweets = data
        .into_iter()
        .map(ApiTweet::into_tweet)
        .collect::<Result<Vec<_>, _>>()?;
    let users = includes
        .and_then(|i| i.users)
        .unwrap_or_default()
        .into_iter()
        .map(ApiUser::into_user)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TweetPage { tweets, users })
}

/// The v2 API wants second precision with a trailing `Z`.
fn format_start_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct XApiClient {
    client: reqwest::Client,
    credentials: TwitterCredentials,
}

impl XApiClient {
    pub fn new(client: reqwest::Client, credentials: TwitterCredentials) -> Self {
        Self { client, credentials }
    }

    /// Signed GET returning the status and raw body.
    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<(reqwest::StatusCode, String), String> {
        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let full_url = if query_string.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, query_string)
        };
        let auth_header = generate_oauth_header("GET", url, &self.credentials, Some(params));

        let response = self
            .client
            .get(&full_url)
            .header("Authorization", auth_header)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let rate_limit = RateLimitInfo::from_response(&response);
        if rate_limit.remaining == Some(0) {
            log::warn!(
                "Twitter: Rate limit exhausted for {}, resets in {}s",
                url,
                rate_limit.seconds_until_reset().unwrap_or(0)
            );
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        log::debug!("Twitter: GET {} ({})", url, status);
        Ok((status, body))
    }

    async fn fetch_timeline(&self, url: String, query: &TimelineQuery) -> Result<TweetPage, String> {
        let max_results = query
            .max_results
            .unwrap_or(MAX_PAGE_SIZE)
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
            .to_string();
        let since_id = query.since_id.map(|id| id.to_string());
        let start_time = query.since_time.as_ref().map(format_start_time);

        let mut params: Vec<(&str, &str)> = vec![
            ("max_results", &max_results),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", "author_id"),
            ("user.fields", USER_FIELDS),
        ];
        if let Some(id) = since_id.as_deref() {
            params.push(("since_id", id));
        }
        if let Some(ts) = start_time.as_deref() {
            params.push(("start_time", ts));
        }

        let (status, body) = self.get(&url, &params).await?;
        if !status.is_success() {
            return Err(format!("API error ({}): {}", status, body));
        }

        let data: TweetsResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {}", e))?;

        if data.data.is_none() {
            if let Some(errors) = data.errors {
                let error_msg = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.title, e.detail))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(format!("Twitter API errors: {}", error_msg));
            }
        }

        into_page(data.data.unwrap_or_default(), data.includes)
    }

    async fn fetch_user(&self, url: String) -> Result<Option<TwitterUser>, String> {
        let (status, body) = self.get(&url, &[("user.fields", USER_FIELDS)]).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(format!("API error ({}): {}", status, body));
        }
        let data: SingleUserResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {}", e))?;
        data.data.map(ApiUser::into_user).transpose()
    }
}

#[async_trait]
impl TwitterApi for XApiClient {
    async fn get_users_tweets(&self, user_id: UserId, query: &TimelineQuery) -> Result<TweetPage, String> {
        self.fetch_timeline(format!("{}/users/{}/tweets", TWITTER_API_BASE, user_id), query)
            .await
    }

    async fn get_users_mentions(&self, user_id: UserId, query: &TimelineQuery) -> Result<TweetPage, String> {
        self.fetch_timeline(format!("{}/users/{}/mentions", TWITTER_API_BASE, user_id), query)
            .await
    }

    async fn get_tweet(&self, tweet_id: TweetId) -> Result<TweetPage, String> {
        let url = format!("{}/tweets/{}", TWITTER_API_BASE, tweet_id);
        let params = [
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", "author_id"),
            ("user.fields", USER_FIELDS),
        ];
        let (status, body) = self.get(&url, &params).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(TweetPage::default());
        }
        if !status.is_success() {
            return Err(format!("API error ({}): {}", status, body));
        }

        // Deleted or protected tweets come back as 200 with only an `errors` array
        let data: SingleTweetResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {}", e))?;
        match data.data {
            Some(tweet) => into_page(vec![tweet], data.includes),
            None => Ok(TweetPage::default()),
        }
    }

    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<TwitterUser>, String> {
        self.fetch_user(format!("{}/users/{}", TWITTER_API_BASE, user_id)).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<TwitterUser>, String> {
        let username = username.trim_start_matches('@');
        self.fetch_user(format!(
            "{}/users/by/username/{}",
            TWITTER_API_BASE,
            percent_encode(username)
        ))
        .await
    }

    async fn create_tweet(&self, tweet: &NewTweet) -> Result<TweetId, String> {
        let url = format!("{}/tweets", TWITTER_API_BASE);
        let auth_header = generate_oauth_header("POST", &url, &self.credentials, None);

        let mut body = serde_json::json!({ "text": tweet.text });
        if let Some(reply_to) = tweet.in_reply_to_tweet_id {
            body["reply"] = serde_json::json!({ "in_reply_to_tweet_id": reply_to.to_string() });
        }
        if let Some(quote) = tweet.quote_tweet_id {
            body["quote_tweet_id"] = serde_json::json!(quote.to_string());
        }
        if !tweet.media_ids.is_empty() {
            body["media"] = serde_json::json!({ "media_ids": tweet.media_ids });
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", auth_header)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        let response_body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("API error ({}): {}", status, response_body));
        }

        let data: PostTweetResponse = serde_json::from_str(&response_body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;
        let posted = data.data.ok_or_else(|| "No tweet data returned".to_string())?;
        parse_id(&posted.id, "tweet id")
    }

    async fn upload_image_from_url(&self, image_url: &str) -> Result<String, String> {
        let image = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| format!("Image download failed: {}", e))?;
        if !image.status().is_success() {
            return Err(format!("Image download failed ({}): {}", image.status(), image_url));
        }
        let bytes = image
            .bytes()
            .await
            .map_err(|e| format!("Image download failed: {}", e))?;

        let form = reqwest::multipart::Form::new().part(
            "media",
            reqwest::multipart::Part::bytes(bytes.to_vec()).file_name("meme.jpg"),
        );
        let auth_header = generate_oauth_header("POST", MEDIA_UPLOAD_URL, &self.credentials, None);

        let response = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .header("Authorization", auth_header)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("API error ({}): {}", status, body));
        }
        let data: MediaUploadResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {}", e))?;
        Ok(data.media_id_string)
    }
}
