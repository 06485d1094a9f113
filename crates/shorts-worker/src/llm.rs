//! Highlight-model seam and the Gemini client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// Single-turn chat model used for segment selection.
///
/// Implementations return the raw response text; the selector owns parsing
/// and validation. Any transport or API error surfaces as `LlmFailed`.
#[async_trait]
pub trait HighlightModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> WorkerResult<String>;
}

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: Client::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

}

#[async_trait]
impl HighlightModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> WorkerResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: 0.7,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::llm_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WorkerError::llm_failed(format!(
                "API returned {}",
                response.status()
            )));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::llm_failed(format!("malformed API response: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| WorkerError::llm_failed("empty candidate list"))?;

        debug!(stage = "selecting", chars = text.len(), "LLM response received");
        Ok(text)
    }
}

/// Extract a JSON array from a chat response that may wrap it in prose or
/// markdown fences.
pub fn extract_json_array(raw: &str) -> Option<serde_json::Value> {
    let mut content = raw.trim();

    // Strip a markdown code fence if present
    if let Some(start) = content.find("```") {
        let after = &content[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            content = after[..end].trim();
        }
    }

    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }

    serde_json::from_str(&content[start..=end]).ok()
}
