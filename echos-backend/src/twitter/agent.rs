use std::sync::Arc;

use super::api::TwitterApi;
use super::pipeline::require_user_id_from_username;
use crate::ai::{MemeGenerator, ResponseGenerator};
use crate::config::ReplyThresholds;
use crate::db::Database;
use crate::models::{AgentProfile, UserId};

/// Uniform sample in `[0, 1)`.
pub type RandomSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Everything a reply-guy cycle needs, passed explicitly to each workflow.
pub struct ReplyGuyAgent {
    pub db: Arc<Database>,
    pub twitter: Arc<dyn TwitterApi>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub memes: Arc<dyn MemeGenerator>,
    pub profile: AgentProfile,
    pub thresholds: ReplyThresholds,
    random: RandomSource,
}

impl ReplyGuyAgent {
    pub fn new(
        db: Arc<Database>,
        twitter: Arc<dyn TwitterApi>,
        generator: Arc<dyn ResponseGenerator>,
        memes: Arc<dyn MemeGenerator>,
        profile: AgentProfile,
        thresholds: ReplyThresholds,
    ) -> Self {
        Self {
            db,
            twitter,
            generator,
            memes,
            profile,
            thresholds,
            random: Arc::new(rand::random::<f64>),
        }
    }

    pub fn with_random_source(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn handle(&self) -> &str {
        &self.profile.twitter_handle
    }

    pub fn sample(&self) -> f64 {
        (self.random)()
    }

    /// The agent's own account id; a cycle cannot run without it.
    pub async fn user_id(&self) -> Result<UserId, String> {
        require_user_id_from_username(&self.db, self.twitter.as_ref(), self.handle()).await
    }
}
