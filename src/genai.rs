//! Generative text provider — drafts short replies via a chat completion API.
//!
//! The engine makes exactly one single-turn call per generative template, so
//! the client is a plain reqwest wrapper rather than a full provider SDK.
//! Absence of credentials is not an error: the engine simply runs without a
//! generator and the response resolver falls back to canned text.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::GenerationError;

/// Default completions endpoint.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for reply drafting.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Bound on the drafted reply length.
const MAX_COMPLETION_TOKENS: u32 = 120;

/// Provider call timeout. The resolver's fallback must trigger on a hung
/// provider, not just an explicit error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SYSTEM_PROMPT: &str = "You write replies to social media comments and direct messages \
on behalf of a business. Reply to the given comment in one or two short, friendly sentences. \
Do not use hashtags. Do not mention that you are an AI.";

/// Drafts a reply to an inbound comment/message.
///
/// Implemented by the HTTP client below; tests substitute scripted fakes.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn draft_reply(&self, original_text: &str) -> Result<String, GenerationError>;
}

/// Chat-completions-backed generator.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: SecretString, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            model,
            base_url,
        }
    }

}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ReplyGenerator for OpenAiGenerator {
    async fn draft_reply(&self, original_text: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": original_text },
            ],
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: CompletionsResponse = serde_json::from_str(&body_text)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                GenerationError::InvalidResponse("completion had no text content".into())
            })?;

        debug!(model = %self.model, chars = content.len(), "Drafted generative reply");
        Ok(content)
    }
}
