//! Agent persona loaded from `<ECHOS_HOME_DIRECTORY>/<agent>.toml`.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerSubscription {
    pub username: String,
    #[serde(default = "default_reply_probability")]
    pub reply_probability: f64,
}

/// Another agent run by the same operator. Its handle is rewritten to
/// `display_name` in outgoing text so agents don't tag each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiblingAgent {
    pub handle: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub twitter_handle: String,
    #[serde(default)]
    pub quote_tweet_probability: f64,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub followers: Vec<FollowerSubscription>,
    #[serde(default)]
    pub sibling_agents: Vec<SiblingAgent>,
}

fn default_reply_probability() -> f64 {
    1.0
}

impl AgentProfile {
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let mut profile: AgentProfile =
            toml::from_str(content).map_err(|e| format!("Invalid agent profile: {}", e))?;
        profile.twitter_handle = profile.twitter_handle.trim_start_matches('@').to_string();
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read agent profile {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Agent profile is missing a name".to_string());
        }
        if self.twitter_handle.is_empty() {
            return Err(format!("Agent '{}' has no twitter_handle", self.name));
        }
        if !(0.0..=1.0).contains(&self.quote_tweet_probability) {
            return Err(format!(
                "quote_tweet_probability must be within [0, 1], got {}",
                self.quote_tweet_probability
            ));
        }
        for follower in &self.followers {
            if !(0.0..=1.0).contains(&follower.reply_probability) {
                return Err(format!(
                    "reply_probability for @{} must be within [0, 1], got {}",
                    follower.username, follower.reply_probability
                ));
            }
        }
        Ok(())
    }

    /// Reply probability for a followed account; unknown accounts always get a reply.
    pub fn reply_probability(&self, username: &str) -> f64 {
        self.followers
            .iter()
            .find(|f| f.username.trim_start_matches('@').eq_ignore_ascii_case(username))
            .map(|f| f.reply_probability)
            .unwrap_or(1.0)
    }

    pub fn follower_usernames(&self) -> Vec<String> {
        self.followers
            .iter()
            .map(|f| f.username.trim_start_matches('@').to_string())
            .collect()
    }
}
