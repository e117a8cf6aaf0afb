use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::prompts::{build_system_prompt, build_user_prompt};
use super::{ReplyContext, ReplyEvaluation, ResponseGenerator};
use crate::models::AgentProfile;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const MAX_TOKENS: u32 = 1024;

/// OpenAI-compatible chat-completions client that asks for a JSON `ReplyEvaluation`.
#[derive(Clone)]
pub struct OpenAiResponseGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiResponseGenerator {
    pub fn new(client: Client, endpoint: Option<&str>, api_key: &str, model: Option<&str>) -> Self {
        Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }
}

/// Extract the evaluation from a completion, tolerating markdown code fences.
fn parse_evaluation(content: &str) -> Option<ReplyEvaluation> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<ReplyEvaluation>(json) {
        Ok(evaluation) if !evaluation.response.trim().is_empty() => Some(evaluation),
        Ok(_) => {
            log::warn!("LLM returned an evaluation with an empty response");
            None
        }
        Err(e) => {
            log::warn!("Failed to parse LLM evaluation: {}", e);
            None
        }
    }
}

#[async_trait]
impl ResponseGenerator for OpenAiResponseGenerator {
    async fn score(
        &self,
        agent: &AgentProfile,
        context: &ReplyContext,
    ) -> Result<Option<ReplyEvaluation>, String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(agent),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_prompt(context),
                },
            ],
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("API error ({}): {}", status, body));
        }

        let completion: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {}", e))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);
        Ok(content.as_deref().and_then(parse_evaluation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVALUATION: &str = r#"{
        "tweet_analysis": "a question about the force",
        "engagement_strategy": "answer with menace",
        "response": "I find your lack of faith disturbing.",
        "response_rating": 8,
        "meme_name": "Drake",
        "meme_id": 181913649,
        "meme_captions": ["rebels", "the empire"],
        "meme_rating": 4
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let eval = parse_evaluation(EVALUATION).unwrap();
        assert_eq!(eval.response_rating, 8);
        assert_eq!(eval.meme_id, Some(181913649));
        assert_eq!(eval.meme_captions, vec!["rebels", "the empire"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{}\n```", EVALUATION);
        assert!(parse_evaluation(&fenced).is_some());
        let fenced = format!("```\n{}\n```\n", EVALUATION);
        assert!(parse_evaluation(&fenced).is_some());
    }

    #[test]
    fn test_malformed_or_empty_is_none() {
        assert!(parse_evaluation("I would rather not.").is_none());
        assert!(parse_evaluation(r#"{"response": "  ", "response_rating": 9}"#).is_none());
    }

    #[test]
    fn test_request_shape() {
        let request = CompletionRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat { format_type: "json_object" },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
