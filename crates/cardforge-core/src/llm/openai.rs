//! OpenAI-compatible provider using the Chat Completions API.
//!
//! Serves OpenAI itself, Together AI, and any generic compatible endpoint;
//! only the base URL and the reported name differ.

use super::provider::{
    classify_status, classify_transport, error_message, LlmProvider, LlmRequest, LlmResponse,
};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Chat Completions provider.
pub struct OpenAiProvider {
    name: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiProvider {
    /// `base_url` is the API root without `/v1` (e.g. `https://api.openai.com`).
    pub fn new(name: &str, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e, request.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(
                &self.name,
                status.as_u16(),
                error_message(&text, status.canonical_reason()),
                request.timeout,
            ));
        }

        let raw = resp
            .text()
            .await
            .map_err(|e| classify_transport(&self.name, &e, request.timeout))?;
        let empty = || LlmError::EmptyResponse {
            provider: self.name.clone(),
        };
        // A 2xx body we cannot decode carries no usable text either.
        let chat_resp: ChatResponse = serde_json::from_str(&raw).map_err(|_| empty())?;

        let text = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(empty)?;

        Ok(LlmResponse {
            text,
            model: chat_resp.model.unwrap_or_else(|| self.model.clone()),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
