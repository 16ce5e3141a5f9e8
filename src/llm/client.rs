use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use crate::llm::{CompletionProfile, Message};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model endpoint error: {0}")]
    Endpoint(String),
    /// The backend produced no usable text (empty choices, malformed body).
    #[error("model returned an undecodable response")]
    Decode,
}

/// A text-completion backend. Handles carry decoder state between calls, so
/// `reset` MUST run before every completion — skipping it causes decode
/// failures on small-model backends.
#[async_trait]
pub trait LlmClient: Send {
    fn reset(&mut self);
    async fn complete(
        &mut self,
        messages: &[Message],
        profile: &CompletionProfile,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat endpoint (llama-server style). `reset` discards the
/// server-side prompt cache on the next request.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    fresh: bool,
}

impl HttpLlmClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            fresh: true,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn reset(&mut self) {
        self.fresh = true;
    }

    async fn complete(
        &mut self,
        messages: &[Message],
        profile: &CompletionProfile,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": messages
                .iter()
                .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
                .collect::<Vec<_>>(),
            "temperature": profile.temperature,
            "top_p": profile.top_p,
            "top_k": profile.top_k,
            "repeat_penalty": profile.repeat_penalty,
            "max_tokens": max_tokens,
            "cache_prompt": !self.fresh,
            "stream": false,
        });
        self.fresh = false;

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Endpoint(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Endpoint(format!("{status}: {text}")));
        }

        let doc: Value = response.json().await.map_err(|_| LlmError::Decode)?;
        let content = doc
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(LlmError::Decode)?;
        Ok(content)
    }
}
