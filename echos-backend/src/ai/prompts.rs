use super::{ConversationSource, ReplyContext};
use crate::models::AgentProfile;
use crate::twitter::types::MentionType;

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{
  "tweet_analysis": "what the conversation is about and what the author wants",
  "engagement_strategy": "how you intend to engage",
  "response": "the reply text, under 280 characters",
  "response_rating": 0-10, how worthwhile it is to post this reply,
  "meme_name": "name of the Imgflip template that fits best, or empty",
  "meme_id": Imgflip template id or null,
  "meme_captions": ["one caption per text box"],
  "meme_rating": 0-10, how much better a meme would land than text
}"#;

pub fn build_system_prompt(agent: &AgentProfile) -> String {
    let mut prompt = format!(
        "You are {}, posting on X as @{}.\n",
        agent.name, agent.twitter_handle
    );
    if !agent.personality.trim().is_empty() {
        prompt.push_str(&format!("\n{}\n", agent.personality.trim()));
    }
    prompt.push_str("\nStay in character. Never use hashtags. Never tag other accounts.\n\n");
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

fn conversation_preamble(source: ConversationSource) -> &'static str {
    match source {
        ConversationSource::Mention(MentionType::TaggedInOriginal) => {
            "Here is the tweet that mentioned you:"
        }
        ConversationSource::Mention(MentionType::TaggedInDirectReply) => {
            "Here is a tweet with a single reply tagging you (reply_tagging_you). \
             If the reply adds to the conversation or asks something, answer it; \
             if it only summons you, respond to the original tweet."
        }
        ConversationSource::Mention(MentionType::TaggedInThread) => {
            "Here is a tweet with a chain of replies leading to the reply that tagged you \
             (reply_tagging_you). If that reply adds to the conversation or asks something, \
             answer it; if it only summons you, respond to the highest numbered reply before it."
        }
        ConversationSource::Follower => "Here is a new tweet from an account you follow:",
    }
}

pub fn build_user_prompt(context: &ReplyContext) -> String {
    let mut prompt = String::new();
    if !context.author_history.is_empty() {
        prompt.push_str(&format!(
            "Recent tweets from @{}, for a sense of who they are:\n",
            context.author_username
        ));
        for (i, tweet) in context.author_history.iter().enumerate() {
            prompt.push_str(&format!("<recent_tweet_{}>\n{}\n</recent_tweet_{}>\n", i + 1, tweet, i + 1));
        }
        prompt.push('\n');
    }
    prompt.push_str(conversation_preamble(context.source));
    prompt.push_str("\n\n");
    prompt.push_str(&context.conversation_summary);
    prompt
}
