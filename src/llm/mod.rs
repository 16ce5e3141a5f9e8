pub mod client;
pub mod gateway;

use anyhow::Result;

// ── Conversation message types ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ── Sampling profiles ─────────────────────────────────────────────────────────

/// Per-model sampling parameters. Small local models are very sensitive to
/// these; the values mirror the upstream model cards.
#[derive(Debug, Clone, Copy)]
pub struct CompletionProfile {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
}

/// Instruct profile for the brain model (routing, integration, direct replies).
pub const BRAIN_PROFILE: CompletionProfile = CompletionProfile {
    temperature: 0.1,
    top_p: 0.1,
    top_k: 50,
    repeat_penalty: 1.05,
};

/// Reasoner profile. High repeat penalty keeps the tiny model from looping.
pub const REASONER_PROFILE: CompletionProfile = CompletionProfile {
    temperature: 0.6,
    top_p: 0.9,
    top_k: 50,
    repeat_penalty: 1.5,
};

// ── LLM output parsing ────────────────────────────────────────────────────────

/// Locates the first `{` … last `}` span and parses it. Small models wrap
/// JSON in prose and markdown fences; this is the tolerant extraction every
/// constrained-generation caller uses.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

/// Same extraction for a top-level `[` … `]` list.
pub fn extract_json_array(text: &str) -> Option<serde_json::Value> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let start = cleaned.find('[')?;
    let end = cleaned.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

// ── HTTP client ───────────────────────────────────────────────────────────────

pub fn build_http_client() -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let Ok(proxy_url) = std::env::var("HTTP_PROXY") {
        builder = builder.proxy(reqwest::Proxy::all(&proxy_url)?);
    }

    if let Ok(ms) = std::env::var("API_TIMEOUT_MS")
        && let Ok(ms) = ms.parse::<u64>()
    {
        builder = builder
            .timeout(std::time::Duration::from_millis(ms))
            .connect_timeout(std::time::Duration::from_secs(10));
    }

    builder.build().map_err(Into::into)
}
