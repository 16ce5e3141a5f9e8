use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::llm::gateway::{LlmGateway, ModelRole};
use crate::tools::executor::truncate_chars;

const MAX_INTEGRATION_INPUT: usize = 6_000;
const MAX_LINKS_PER_RESULT: usize = 5;

static TASK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[TASK:[^\]]*\]").expect("task-header regex"));

/// One parsed section of a task aggregate.
#[derive(Debug, Clone)]
pub enum Section {
    Structured(Value),
    Text(String),
}

/// Splits a `[TASK: …] DATA: …` aggregate into payload sections. The second
/// return value says whether the aggregate used the task format at all —
/// opaque text only renders deterministically inside that format.
pub fn split_sections(aggregate: &str) -> (Vec<Section>, bool) {
    let mut sections = Vec::new();
    if aggregate.contains("[TASK:") && aggregate.contains("DATA:") {
        for raw in TASK_HEADER.split(aggregate) {
            let Some((_, data)) = raw.split_once("DATA:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            match parse_mapping(data) {
                Some(value) => sections.push(Section::Structured(value)),
                None => sections.push(Section::Text(data.to_string())),
            }
        }
        return (sections, true);
    }

    if aggregate.contains('{')
        && let Some(value) = parse_mapping(aggregate.trim())
    {
        sections.push(Section::Structured(value));
    } else {
        sections.push(Section::Text(aggregate.to_string()));
    }
    (sections, false)
}

fn parse_mapping(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    value.is_object().then_some(value)
}

/// Normalizes a `{success, tool, result}` wrapper (or a bare payload) into
/// the one mapping downstream renderers look at.
pub fn unwrap_payload(value: &Value) -> &Value {
    match value.get("result") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    }
}

// ── Deterministic renderers ───────────────────────────────────────────────────

/// Renders every section it knows how to. A non-empty return means the
/// authoritative deterministic path won and no model pass runs.
pub fn render_deterministic(sections: &[Section], task_format: bool) -> Vec<String> {
    let mut blocks = Vec::new();
    for section in sections {
        match section {
            Section::Text(content) => {
                if !task_format {
                    continue;
                }
                let content = content.trim();
                if content.is_empty() {
                    continue;
                }
                if content.len() > 50 {
                    blocks.push(format!("### 📋 **Report**\n{content}"));
                } else {
                    blocks.push(content.to_string());
                }
            }
            Section::Structured(value) => {
                let inner = unwrap_payload(value);
                if let Some(block) = render_results_list(inner).or_else(|| render_results_list(value))
                {
                    blocks.push(block);
                } else if let Some(block) =
                    render_weather(inner).or_else(|| render_weather(value))
                {
                    blocks.push(block);
                } else if let Some(block) = render_generic(inner) {
                    blocks.push(block);
                }
            }
        }
    }
    blocks
}

/// Search/news list: titles, trimmed summaries, and source URLs carried
/// byte-exact — the guard against model-invented links.
fn render_results_list(value: &Value) -> Option<String> {
    let results = value.get("results")?.as_array()?;
    let query = value
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("Search Results");
    let mut lines = vec![format!("### 📰 **{query}**")];
    for item in results {
        let Some(item) = item.as_object() else {
            continue;
        };
        let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("No Title");
        let url = item
            .get("url")
            .or_else(|| item.get("link"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let summary = item
            .get("snippet")
            .or_else(|| item.get("description"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                let source = item.get("source").and_then(|v| v.as_str()).unwrap_or("");
                let date = item.get("date").and_then(|v| v.as_str()).unwrap_or("");
                format!("{source} {date}").trim().to_string()
            });
        let summary = truncate_chars(&summary.replace('\n', " "), 200);
        lines.push(format!(
            "> **{title}**\n> {summary}...\n> 🔗 [Read Source]({url})\n"
        ));
    }
    (lines.len() > 1).then(|| lines.join("\n"))
}

fn render_weather(value: &Value) -> Option<String> {
    let temperature = value.get("temperature")?.as_str()?;
    let condition = value.get("condition")?.as_str()?;
    let location = value.get("location").and_then(|v| v.as_str()).unwrap_or("City");
    Some(format!(
        "### 🌦️ **{location} Weather**\n- **Temperature**: {temperature}\n- **Condition**: {condition}"
    ))
}

/// Last-resort rendering: scalar fields as a key-value bullet list.
fn render_generic(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    let lines: Vec<String> = map
        .iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some(format!("- **{k}**: {s}")),
            Value::Number(n) => Some(format!("- **{k}**: {n}")),
            Value::Bool(b) => Some(format!("- **{k}**: {b}")),
            _ => None,
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Pulls every `title`/`url` pair out of the parsed sections for the link
/// appendix the model pass must never be trusted to reproduce.
pub fn collect_source_links(sections: &[Section]) -> Vec<(String, String)> {
    let mut links = Vec::new();
    for section in sections {
        let Section::Structured(value) = section else {
            continue;
        };
        let inner = unwrap_payload(value);
        let Some(results) = inner
            .get("results")
            .or_else(|| value.get("results"))
            .and_then(|v| v.as_array())
        else {
            continue;
        };
        for item in results.iter().take(MAX_LINKS_PER_RESULT) {
            let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("No Title");
            let url = item
                .get("url")
                .or_else(|| item.get("link"))
                .and_then(|v| v.as_str())
                .unwrap_or("#");
            if title != "No Title" && url != "#" && !url.is_empty() {
                links.push((title.to_string(), url.to_string()));
            }
        }
    }
    links
}

// ── Formatter ─────────────────────────────────────────────────────────────────

/// Deterministic structured→text rendering with a constrained model pass as
/// the fallback for opaque aggregates.
pub struct ResultFormatter {
    gateway: Arc<dyn LlmGateway>,
}

impl ResultFormatter {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Formats `aggregate` as the reply to `user_request`. Order-insensitive
    /// over sections and never fails: worst case it returns the raw data.
    pub async fn integrate(&self, user_request: &str, aggregate: &str) -> String {
        let (sections, task_format) = split_sections(aggregate);

        let blocks = render_deterministic(&sections, task_format);
        if !blocks.is_empty() {
            return blocks.join("\n\n");
        }

        let content = self.llm_pass(user_request, aggregate).await;
        append_links(content, &collect_source_links(&sections))
    }

    /// Integration over ordered `Query:`/`Result:` pairs (the decomposition
    /// aggregate). Always a model pass — comparison needs prose — with the
    /// source links re-attached from the raw results afterwards.
    pub async fn integrate_pairs(&self, user_request: &str, pairs: &[(String, String)]) -> String {
        let aggregate = pairs
            .iter()
            .map(|(q, r)| format!("Query: {q}\nResult: {}", truncate_chars(r, 500)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let sections: Vec<Section> = pairs
            .iter()
            .filter_map(|(_, r)| serde_json::from_str::<Value>(r).ok())
            .filter(|v| v.is_object())
            .map(Section::Structured)
            .collect();

        let content = self.llm_pass(user_request, &aggregate).await;
        append_links(content, &collect_source_links(&sections))
    }

    async fn llm_pass(&self, user_request: &str, aggregate: &str) -> String {
        let prompt = format!(
            "You are a helpful assistant.\n\
             Your goal is to nicely format the provided data into a readable list.\n\n\
             [STRICT RULES]\n\
             1. Output in ENGLISH.\n\
             2. For SEARCH/NEWS results, you MUST use this format:\n   * [Title] - [Summary] (Link: [URL])\n\
             3. For WEATHER, use:\n   * [City] Weather: [Temp] / [Condition]\n\
             4. Do NOT add an introduction or conclusion. Just the list.\n\
             5. If the data is empty or an error, say \"No information found.\"\n\
             6. CRITICAL: Use ONLY the provided [Input Data]. Never alter a URL and never invent information. One bullet per item.\n\n\
             [Input Data]\n{}\n\n\
             [User Request]\n{}\n\n\
             [Output]",
            truncate_chars(aggregate, MAX_INTEGRATION_INPUT),
            user_request,
        );

        match self
            .gateway
            .complete(
                ModelRole::Brain,
                "You are a helpful assistant. Output only the formatted list.",
                &prompt,
                1536,
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "integration pass failed, returning raw data");
                truncate_chars(aggregate, MAX_INTEGRATION_INPUT)
            }
        }
    }
}

/// The small model routinely drops links; re-attach them from source.
fn append_links(mut content: String, links: &[(String, String)]) -> String {
    if links.is_empty() {
        return content;
    }
    content.push_str("\n\n### 🔗 관련 뉴스/자료 (자동 첨부)\n");
    content.push_str(
        &links
            .iter()
            .map(|(title, url)| format!("* [{title}]({url})"))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    content
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Section, collect_source_links, render_deterministic, split_sections};

    fn task_aggregate() -> String {
        let search = json!({
            "success": true,
            "tool": "search_web",
            "result": {
                "query": "rust async",
                "results": [
                    {"title": "Async Book", "url": "https://rust-lang.github.io/async-book/?x=1&y=2", "snippet": "Learn async"}
                ]
            }
        });
        let weather = json!({
            "success": true,
            "tool": "get_weather",
            "result": {
                "location": "Seoul", "temperature": "20°C", "condition": "Sunny",
                "humidity": "40%", "feels_like": "19°C", "wind": "10 km/h"
            }
        });
        format!(
            "[TASK: search rust async]\nDATA: {search}\n\n[TASK: Seoul weather]\nDATA: {weather}"
        )
    }

    #[test]
    fn urls_survive_byte_exact() {
        let (sections, task_format) = split_sections(&task_aggregate());
        let blocks = render_deterministic(&sections, task_format);
        let joined = blocks.join("\n\n");
        assert!(joined.contains("https://rust-lang.github.io/async-book/?x=1&y=2"));
    }

    #[test]
    fn weather_card_renders_from_wrapper() {
        let (sections, task_format) = split_sections(&task_aggregate());
        let blocks = render_deterministic(&sections, task_format);
        let joined = blocks.join("\n\n");
        assert!(joined.contains("### 🌦️ **Seoul Weather**"));
        assert!(joined.contains("20°C"));
        assert!(joined.contains("Sunny"));
    }

    #[test]
    fn sections_are_order_insensitive() {
        let (sections, fmt) = split_sections(&task_aggregate());
        let mut reversed = sections.clone();
        reversed.reverse();
        let a = render_deterministic(&sections, fmt).len();
        let b = render_deterministic(&reversed, fmt).len();
        assert_eq!(a, b);
    }

    #[test]
    fn long_text_data_gets_report_header() {
        let aggregate = format!(
            "[TASK: summarize]\nDATA: {}",
            "This summary sentence is certainly longer than fifty characters in total."
        );
        let (sections, fmt) = split_sections(&aggregate);
        let blocks = render_deterministic(&sections, fmt);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].starts_with("### 📋 **Report**"));
    }

    #[test]
    fn plain_prose_is_not_deterministic() {
        let (sections, fmt) = split_sections("just a model reply with no structure");
        assert!(render_deterministic(&sections, fmt).is_empty());
    }

    #[test]
    fn bare_weather_mapping_renders() {
        let (sections, _) = split_sections(
            &json!({"location": "Tokyo", "temperature": "18°C", "condition": "Cloudy"}).to_string(),
        );
        let blocks = render_deterministic(&sections, false);
        assert!(blocks[0].contains("**Tokyo Weather**"));
    }

    #[test]
    fn link_collection_skips_untitled_items() {
        let sections = vec![Section::Structured(json!({
            "results": [
                {"title": "Good", "url": "https://a"},
                {"title": "No Title", "url": "https://b"},
                {"title": "Bad", "url": "#"}
            ]
        }))];
        let links = collect_source_links(&sections);
        assert_eq!(links, vec![("Good".to_string(), "https://a".to_string())]);
    }
}
