//! Queue-driven generator doubles that record what they were asked.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{MemeGenerator, MemeImage, ReplyContext, ReplyEvaluation, ResponseGenerator};
use crate::models::AgentProfile;

pub fn build_evaluation(response: &str, response_rating: u8, meme_rating: u8) -> ReplyEvaluation {
    ReplyEvaluation {
        tweet_analysis: "analysis".to_string(),
        engagement_strategy: "strategy".to_string(),
        response: response.to_string(),
        response_rating,
        meme_name: "Drake Hotline Bling".to_string(),
        meme_id: Some(181913649),
        meme_captions: vec!["top".to_string(), "bottom".to_string()],
        meme_rating,
    }
}

#[derive(Clone, Default)]
pub struct MockResponseGenerator {
    responses: Arc<Mutex<VecDeque<Result<Option<ReplyEvaluation>, String>>>>,
    trace: Arc<Mutex<Vec<ReplyContext>>>,
}

impl MockResponseGenerator {
    /// Responses are returned in order; once exhausted every call yields `Ok(None)`.
    pub fn new(responses: Vec<Result<Option<ReplyEvaluation>, String>>) -> Self {
        MockResponseGenerator {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            trace: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_trace(&self) -> Vec<ReplyContext> {
        self.trace.lock().clone()
    }
}

#[async_trait]
impl ResponseGenerator for MockResponseGenerator {
    async fn score(
        &self,
        _agent: &AgentProfile,
        context: &ReplyContext,
    ) -> Result<Option<ReplyEvaluation>, String> {
        self.trace.lock().push(context.clone());
        self.responses.lock().pop_front().unwrap_or(Ok(None))
    }
}

#[derive(Clone, Default)]
pub struct MockMemeGenerator {
    result: Arc<Mutex<Option<Result<Option<MemeImage>, String>>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockMemeGenerator {
    /// Always returns `url`.
    pub fn returning(url: &str) -> Self {
        let generator = Self::default();
        *generator.result.lock() = Some(Ok(Some(MemeImage {
            url: url.to_string(),
            page_url: None,
        })));
        generator
    }

    pub fn failing(error: &str) -> Self {
        let generator = Self::default();
        *generator.result.lock() = Some(Err(error.to_string()));
        generator
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl MemeGenerator for MockMemeGenerator {
    async fn caption(&self, _evaluation: &ReplyEvaluation) -> Result<Option<MemeImage>, String> {
        *self.calls.lock() += 1;
        self.result.lock().clone().unwrap_or(Ok(None))
    }
}
