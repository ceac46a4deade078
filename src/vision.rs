//! Vision extraction client for Groq's OpenAI-compatible completions API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Instruction prompt sent with every receipt image. The model must answer
/// with a single JSON object matching the extraction shape.
pub const RECEIPT_PROMPT: &str = r#"Analyze the receipt image and return a JSON object with:
{
  "storeName": "string",
  "date": "YYYY-MM-DD",
  "totalAmount": number,
  "currency": "string",
  "items": [{"name": "string", "price": number, "category": "string"}],
  "aiSummary": "string"
}
Return ONLY valid JSON. If you can't read something, make a best guess."#;

const GROQ_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Single-turn receipt extraction from an image URL.
#[async_trait]
pub trait VisionExtractor: Send + Sync {
    /// Returns the raw completion text for one image, expected to be JSON.
    async fn extract(&self, image_url: &str) -> Result<String>;
}

/// Groq-backed vision client with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct GroqVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GroqVision {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build vision HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

/// Deterministic single-turn completion request: zero sampling temperature
/// and a JSON-object response format.
fn completion_request(model: &str, image_url: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    {"type": "text", "text": RECEIPT_PROMPT},
                    {"type": "image_url", "image_url": {"url": image_url}}
                ]
            }
        ],
        "temperature": 0.0,
        "response_format": {"type": "json_object"}
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

fn completion_text(completion: ChatCompletion) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("Vision response contained no choices"))
}

#[async_trait]
impl VisionExtractor for GroqVision {
    async fn extract(&self, image_url: &str) -> Result<String> {
        debug!(model = %self.model, "Requesting vision extraction");

        let response = self
            .client
            .post(GROQ_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&completion_request(&self.model, image_url))
            .send()
            .await
            .context("Vision service request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Vision service returned {status}: {detail}"));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .context("Vision response was not a chat completion")?;

        completion_text(completion)
    }
}
