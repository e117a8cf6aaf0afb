//! Text helpers shared across the ingestion and reply workflows.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{SiblingAgent, Tweet, TweetId, TweetType};

/// Run of leading `@handle ` tokens the platform prepends to replies.
static LEADING_MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(@\w+\s+)*").unwrap());

static TWEET_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/\w+/status(?:es)?/(\d+)").unwrap()
});

/// Strip the auto-inserted `@handle` prefix from a reply's text.
pub fn remove_tweet_reply_tags(text: &str) -> &str {
    match LEADING_MENTION_PATTERN.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

fn is_handle_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Count whole-token `@handle` occurrences, ignoring case.
pub fn count_handle_mentions(text: &str, handle: &str) -> usize {
    let handle = handle.trim_start_matches('@');
    if handle.is_empty() {
        return 0;
    }
    let needle = format!("@{}", handle.to_ascii_lowercase());
    let haystack = text.to_ascii_lowercase();
    let bytes = haystack.as_bytes();
    haystack
        .match_indices(&needle)
        .filter(|(idx, _)| {
            let end = idx + needle.len();
            let starts_token = *idx == 0 || !is_handle_char(bytes[idx - 1]);
            let ends_token = end >= bytes.len() || !is_handle_char(bytes[end]);
            starts_token && ends_token
        })
        .count()
}

pub fn contains_handle(text: &str, handle: &str) -> bool {
    count_handle_mentions(text, handle) > 0
}

pub fn get_tweet_url(username: &str, tweet_id: TweetId) -> String {
    format!("https://x.com/{}/status/{}", username.trim_start_matches('@'), tweet_id)
}

/// Accept either a bare tweet id or a status link.
pub fn parse_tweet_reference(reference: &str) -> Option<TweetId> {
    let reference = reference.trim();
    if !reference.is_empty() && reference.chars().all(|c| c.is_ascii_digit()) {
        return reference.parse().ok();
    }
    TWEET_URL_PATTERN
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Kinds of tweets a timeline fetch can leave out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetExclusion {
    Replies,
    QuoteTweets,
    Retweets,
}

impl TweetExclusion {
    fn matches(&self, tweet: &Tweet) -> bool {
        match self {
            TweetExclusion::Replies => tweet.tweet_type == TweetType::Reply,
            TweetExclusion::QuoteTweets => tweet.tweet_type == TweetType::Quote,
            TweetExclusion::Retweets => tweet.tweet_type == TweetType::Retweet,
        }
    }
}

/// Client-side filter; the platform's own exclusion flags miss some cases.
pub fn filter_tweet_exclusions(tweets: Vec<Tweet>, exclusions: &[TweetExclusion]) -> Vec<Tweet> {
    if exclusions.is_empty() {
        return tweets;
    }
    tweets
        .into_iter()
        .filter(|tweet| !exclusions.iter().any(|e| e.matches(tweet)))
        .collect()
}

/// Replace `@handle` of sibling agents with their display names.
pub fn scrub_sibling_handles(text: &str, siblings: &[SiblingAgent]) -> String {
    let mut result = text.to_string();
    for sibling in siblings {
        let handle = sibling.handle.trim_start_matches('@');
        if handle.is_empty() {
            continue;
        }
        let pattern = format!(r"(?i)@{}\b", regex::escape(handle));
        match Regex::new(&pattern) {
            Ok(re) => result = re.replace_all(&result, sibling.display_name.as_str()).into_owned(),
            Err(e) => log::warn!("Twitter: Invalid sibling handle '{}': {}", handle, e),
        }
    }
    result
}

/// Shorten text for log lines, respecting char boundaries.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
