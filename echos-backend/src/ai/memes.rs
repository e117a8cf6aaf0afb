//! Imgflip `caption_image` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{MemeGenerator, MemeImage, ReplyEvaluation};

const CAPTION_IMAGE_URL: &str = "https://api.imgflip.com/caption_image";

/// Imgflip accepts at most this many text boxes.
const MAX_BOXES: usize = 20;

#[derive(Debug, Deserialize)]
struct ImgflipResponse {
    success: bool,
    data: Option<ImgflipData>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImgflipData {
    url: String,
    page_url: Option<String>,
}

#[derive(Clone)]
pub struct ImgflipMemeGenerator {
    client: Client,
    credentials: Option<(String, String)>,
}

impl ImgflipMemeGenerator {
    /// Without credentials every caption request yields no image.
    pub fn new(client: Client, username: Option<String>, password: Option<String>) -> Self {
        let credentials = match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        };
        Self { client, credentials }
    }
}

/// Form fields for a caption request, boxes encoded as `boxes[i][key]`.
fn caption_form(template_id: i64, captions: &[String], username: &str, password: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("template_id".to_string(), template_id.to_string()),
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ];
    for (i, text) in captions.iter().take(MAX_BOXES).enumerate() {
        form.push((format!("boxes[{}][text]", i), text.clone()));
        form.push((format!("boxes[{}][color]", i), "#ffffff".to_string()));
        form.push((format!("boxes[{}][outline_color]", i), "#000000".to_string()));
    }
    form
}

#[async_trait]
impl MemeGenerator for ImgflipMemeGenerator {
    async fn caption(&self, evaluation: &ReplyEvaluation) -> Result<Option<MemeImage>, String> {
        let Some((username, password)) = &self.credentials else {
            log::debug!("Imgflip credentials not configured, skipping meme");
            return Ok(None);
        };
        let Some(template_id) = evaluation.meme_id.filter(|id| *id > 0) else {
            return Ok(None);
        };
        if evaluation.meme_captions.iter().all(|c| c.trim().is_empty()) {
            return Ok(None);
        }

        let form = caption_form(template_id, &evaluation.meme_captions, username, password);
        let response = self
            .client
            .post(CAPTION_IMAGE_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("API error ({}): {}", status, body));
        }

        let parsed: ImgflipResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {}", e))?;
        if !parsed.success {
            return Err(format!(
                "Imgflip API error: {}",
                parsed.error_message.unwrap_or_else(|| "Unknown error".to_string())
            ));
        }

        Ok(parsed.data.map(|data| {
            log::info!("Imgflip: Captioned template {} -> {}", template_id, data.url);
            MemeImage {
                url: data.url,
                page_url: data.page_url,
            }
        }))
    }
}
