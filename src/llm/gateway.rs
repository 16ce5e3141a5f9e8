use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::{BRAIN_PROFILE, Message, REASONER_PROFILE};

/// Which model handle a completion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Brain,
    Reasoner,
}

/// User-visible stand-in when the backend cuts off mid-generation.
pub const TRUNCATED_MSG: &str = "⚠️ Response generation was cut short (decode failure).";

/// Narrow model-call interface handed to workers and the dispatcher. Keeping
/// this seam small breaks the worker↔orchestrator cycle.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(
        &self,
        role: ModelRole,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String>;
}

struct Handles {
    brain: Box<dyn LlmClient>,
    reasoner: Box<dyn LlmClient>,
}

/// Owns both model handles behind one process-wide lock. Handles carry
/// internal decoder state and are not concurrency-safe; the lock spans
/// exactly one completion, and `reset` runs before every call.
pub struct ModelGateway {
    handles: Mutex<Handles>,
}

impl ModelGateway {
    pub fn new(brain: Box<dyn LlmClient>, reasoner: Box<dyn LlmClient>) -> Self {
        Self {
            handles: Mutex::new(Handles { brain, reasoner }),
        }
    }
}

#[async_trait]
impl LlmGateway for ModelGateway {
    async fn complete(
        &self,
        role: ModelRole,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let messages = [Message::system(system), Message::user(user)];
        let mut guard = self.handles.lock().await;
        let (handle, profile) = match role {
            ModelRole::Brain => (&mut guard.brain, &BRAIN_PROFILE),
            ModelRole::Reasoner => (&mut guard.reasoner, &REASONER_PROFILE),
        };
        handle.reset();
        match handle.complete(&messages, profile, max_tokens).await {
            Ok(raw) => Ok(clean_response(&raw)),
            Err(LlmError::Decode) => {
                tracing::warn!(?role, "model decode failure");
                Ok(TRUNCATED_MSG.to_string())
            }
            Err(e @ LlmError::Endpoint(_)) => Err(e.into()),
        }
    }
}

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think-block regex"));

/// Strips `<think>…</think>` traces. An unterminated `<think>` means the
/// model spent its whole budget thinking and produced no answer.
pub fn clean_response(text: &str) -> String {
    let cleaned = THINK_BLOCK.replace_all(text, "").trim().to_string();
    if cleaned.contains("<think>") {
        return TRUNCATED_MSG.to_string();
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::clean_response;

    #[test]
    fn strips_closed_think_block() {
        assert_eq!(clean_response("<think>hmm</think>The answer is 4."), "The answer is 4.");
    }

    #[test]
    fn unterminated_think_becomes_truncation_notice() {
        let out = clean_response("<think>still going");
        assert!(out.contains("cut short"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean_response("  hello  "), "hello");
    }
}
