use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;

/// The reasoning-backend seam. One operation, no structural guarantee on the
/// returned text; callers must normalize every response and survive failure.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Examiner: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// --- OpenAI chat completions ---

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct OpenAiExaminer {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiExaminer {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Examiner for OpenAiExaminer {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI request failed")?
            .error_for_status()
            .context("OpenAI returned an error status")?
            .json::<ChatResponse>()
            .await
            .context("Failed to decode OpenAI response")?;

        let content = resp
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .context("OpenAI response contained no choices")?;
        Ok(content)
    }
}

// --- Gemini generateContent ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: String,
}

pub struct GeminiExaminer {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiExaminer {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Examiner for GeminiExaminer {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let body = serde_json::json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ]
        });

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?
            .error_for_status()
            .context("Gemini returned an error status")?
            .json::<GeminiResponse>()
            .await
            .context("Failed to decode Gemini response")?;

        let text = resp
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .context("Gemini response contained no candidates")?;
        Ok(text)
    }
}
