//! Thread-aware views over stored tweets.

use serde::Serialize;
use strum::AsRefStr;

use crate::models::Tweet;

/// A tweet together with its author's handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydratedTweet {
    pub tweet: Tweet,
    pub username: String,
}

impl HydratedTweet {
    pub fn new(tweet: Tweet, username: impl Into<String>) -> Self {
        Self {
            tweet,
            username: username.into(),
        }
    }

    fn to_prompt_block(&self, tag: &str) -> String {
        format!("<{tag}>\n@{}\n{}\n</{tag}>\n", self.username, self.tweet.text)
    }
}

/// Where in a thread the agent was tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MentionType {
    /// The tag is in a root tweet.
    TaggedInOriginal,
    /// The tag is in a direct reply to a root tweet.
    TaggedInDirectReply,
    /// The tag is deeper in a reply chain.
    TaggedInThread,
}

/// A tweet that tagged the agent, with the thread leading up to it.
///
/// `replies` holds the intermediate tweets between the root and the tagged
/// tweet, oldest first; it is empty unless the mention is in a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetMention {
    pub tagged_tweet: HydratedTweet,
    pub original_tweet: Option<HydratedTweet>,
    pub replies: Vec<HydratedTweet>,
}

impl TweetMention {
    /// Build from the tagged tweet and its ancestors (root first).
    pub fn from_thread(tagged_tweet: HydratedTweet, mut parents: Vec<HydratedTweet>) -> Self {
        if parents.is_empty() {
            return Self {
                tagged_tweet,
                original_tweet: None,
                replies: Vec::new(),
            };
        }
        let original_tweet = parents.remove(0);
        Self {
            tagged_tweet,
            original_tweet: Some(original_tweet),
            replies: parents,
        }
    }

    pub fn mention_type(&self) -> MentionType {
        match (&self.original_tweet, self.replies.is_empty()) {
            (None, _) => MentionType::TaggedInOriginal,
            (Some(_), true) => MentionType::TaggedInDirectReply,
            (Some(_), false) => MentionType::TaggedInThread,
        }
    }

    /// The tweet that started the conversation (the tagged tweet itself for a root tag).
    pub fn root_tweet(&self) -> &HydratedTweet {
        self.original_tweet.as_ref().unwrap_or(&self.tagged_tweet)
    }

    /// Conversation rendered as tagged blocks for the response generator.
    pub fn to_prompt_summary(&self) -> String {
        let Some(original) = &self.original_tweet else {
            return self.tagged_tweet.to_prompt_block("tweet");
        };

        let mut summary = original.to_prompt_block("original_tweet");
        for (index, reply) in self.replies.iter().enumerate() {
            summary.push_str(&reply.to_prompt_block(&format!("reply_{}", index + 1)));
        }
        summary.push_str(&self.tagged_tweet.to_prompt_block("reply_tagging_you"));
        summary
    }
}

/// A new tweet from an account the agent follows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowerTweet {
    pub tweet: Tweet,
    pub username: String,
}

impl FollowerTweet {
    pub fn to_prompt_summary(&self) -> String {
        format!("<tweet>\n@{}\n{}\n</tweet>\n", self.username, self.tweet.text)
    }
}
