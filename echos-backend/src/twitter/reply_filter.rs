//! Decides whether a mention is a deliberate summons of the agent.
//!
//! Replies carry an auto-generated prefix of `@handles` for everyone already
//! in the thread, ordered by most recent activity and excluding the author.
//! An explicit tag typed by the author shows up either after that prefix, or
//! as a second copy of the handle inside it:
//!
//! ```text
//! userA: hey              -> "hey"
//! userB: hi               -> "@userA hi"
//! userC: adding @bot      -> "@userB @userA adding @bot"
//! userB: hey              -> "@userC @userA @bot hey"   (bot only in the prefix)
//! ```
//!
//! A single handle inside the prefix is only trusted when nothing earlier in
//! the thread could have put it there.

use super::helpers::{contains_handle, count_handle_mentions, remove_tweet_reply_tags};
use super::types::{MentionType, TweetMention};

pub fn should_reply_to_mention(bot_handle: &str, mention: &TweetMention) -> bool {
    let bot_handle = bot_handle.trim_start_matches('@');

    let tagged = &mention.tagged_tweet;
    let original_has_media = mention
        .original_tweet
        .as_ref()
        .is_some_and(|original| original.tweet.has_media());
    if tagged.tweet.has_media() || original_has_media {
        return false;
    }

    let Some(original) = mention.original_tweet.as_ref() else {
        return true;
    };

    let text = &tagged.tweet.text;
    let tag_count = count_handle_mentions(text, bot_handle);
    if tag_count == 0 {
        return false;
    }

    if contains_handle(remove_tweet_reply_tags(text), bot_handle) {
        return true;
    }

    if tag_count >= 2 {
        return true;
    }

    let tagged_in_original = contains_handle(&original.tweet.text, bot_handle);
    if mention.mention_type() == MentionType::TaggedInDirectReply {
        return !tagged_in_original;
    }

    let tagged_earlier = tagged_in_original
        || mention
            .replies
            .iter()
            .any(|reply| contains_handle(&reply.tweet.text, bot_handle));
    let replied_earlier = mention
        .replies
        .iter()
        .any(|reply| reply.username.eq_ignore_ascii_case(bot_handle));

    !tagged_earlier && !replied_earlier
}
