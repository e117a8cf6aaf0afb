//! Response and meme generation collaborators.
//!
//! The pipeline only depends on the `ResponseGenerator` and `MemeGenerator`
//! traits; `OpenAiResponseGenerator` and `ImgflipMemeGenerator` are the
//! production implementations.

pub mod memes;
pub mod openai;
mod prompts;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::AgentProfile;
use crate::twitter::types::MentionType;

pub use memes::ImgflipMemeGenerator;
pub use openai::OpenAiResponseGenerator;

/// Highest rating the generator can assign.
pub const MAX_RATING: u8 = 10;

/// The generator's verdict on a conversation: a candidate reply, a meme
/// suggestion, and how good each one is on a 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEvaluation {
    #[serde(default)]
    pub tweet_analysis: String,
    #[serde(default)]
    pub engagement_strategy: String,
    pub response: String,
    #[serde(deserialize_with = "deserialize_rating")]
    pub response_rating: u8,
    #[serde(default)]
    pub meme_name: String,
    #[serde(default)]
    pub meme_id: Option<i64>,
    #[serde(default)]
    pub meme_captions: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_rating")]
    pub meme_rating: u8,
}

/// Accepts integers, floats or numeric strings; clamps to `0..=MAX_RATING`.
fn deserialize_rating<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let rating = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("invalid rating: {}", value)))?;
    Ok(rating.floor().clamp(0.0, MAX_RATING as f64) as u8)
}

/// Where the conversation being scored came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationSource {
    Mention(MentionType),
    Follower,
}

/// Everything the generator is shown about one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyContext {
    pub source: ConversationSource,
    pub author_username: String,
    pub conversation_summary: String,
    pub author_history: Vec<String>,
}

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Score a conversation. `Ok(None)` means the generator produced nothing usable.
    async fn score(
        &self,
        agent: &AgentProfile,
        context: &ReplyContext,
    ) -> Result<Option<ReplyEvaluation>, String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemeImage {
    pub url: String,
    pub page_url: Option<String>,
}

#[async_trait]
pub trait MemeGenerator: Send + Sync {
    /// Render the evaluation's meme suggestion. `Ok(None)` when there is nothing to render.
    async fn caption(&self, evaluation: &ReplyEvaluation) -> Result<Option<MemeImage>, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_deserialization() {
        let raw = r#"{"response": "hi", "response_rating": "7", "meme_rating": 12.6}"#;
        let eval: ReplyEvaluation = serde_json::from_str(raw).unwrap();
        assert_eq!(eval.response_rating, 7);
        assert_eq!(eval.meme_rating, 10);
        assert!(eval.meme_captions.is_empty());
        assert_eq!(eval.meme_id, None);

        let raw = r#"{"response": "hi", "response_rating": -3}"#;
        let eval: ReplyEvaluation = serde_json::from_str(raw).unwrap();
        assert_eq!(eval.response_rating, 0);
        assert_eq!(eval.meme_rating, 0);

        let raw = r#"{"response": "hi", "response_rating": "great"}"#;
        assert!(serde_json::from_str::<ReplyEvaluation>(raw).is_err());
    }
}
