use std::sync::{Arc, LazyLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::cowork::workers::{Worker, WorkerContext};
use crate::llm::extract_json_object;
use crate::llm::gateway::{LlmGateway, ModelRole};
use crate::office::{OfficeBackend, ReportDoc, SheetData, SlideDeck};

const OFFICE_SYSTEM_PROMPT: &str = "\
You are an expert business consultant and office-automation specialist.
Your goal is to create professional, detailed, insightful documents.

[OUTPUT FORMAT]
- Output ONLY valid JSON. No markdown fences, no explanations.
- The JSON structure must match the request exactly.

[THINKING PROCESS]
1. Analyze the request and context.
2. Structure the document logically (introduction -> body -> conclusion).
3. Draft content with high detail density.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Slides,
    Report,
    Sheet,
}

static FOLDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"['"]([A-Za-z0-9가-힣_-]+)['"]?\s*(?:폴더|folder|directory)"#,
        r#"(?:폴더|folder|directory)[:\s]+['"]?([A-Za-z0-9가-힣_-]+)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("folder pattern"))
    .collect()
});

fn detect_kind(lower: &str) -> DocKind {
    if ["ppt", "powerpoint", "presentation", "발표", "프레젠테이션", "슬라이드", "slide"]
        .iter()
        .any(|k| lower.contains(k))
    {
        DocKind::Slides
    } else if ["excel", "xlsx", "엑셀", "스프레드시트", "spreadsheet", "표", "통계"]
        .iter()
        .any(|k| lower.contains(k))
    {
        DocKind::Sheet
    } else {
        // Word-style reports are the default document shape.
        DocKind::Report
    }
}

/// `"create_ppt: Title | folder"` carries both the topic and the output dir.
fn split_task(description: &str) -> (String, String) {
    let after_prefix = description
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(description);
    let (topic_part, folder_part) = match after_prefix.split_once('|') {
        Some((t, f)) => (t, Some(f)),
        None => (after_prefix, None),
    };
    let topic = topic_part.trim();
    let topic = if topic.is_empty() {
        description.trim().to_string()
    } else {
        topic.to_string()
    };

    let folder = folder_part
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .or_else(|| {
            FOLDER_PATTERNS
                .iter()
                .find_map(|re| re.captures(description).map(|c| c[1].to_string()))
        })
        .unwrap_or_else(|| "output".to_string());
    (topic, folder)
}

/// Generates structured document JSON with the brain model and hands it to
/// the external generator. Parse failures fall back to a fixed structure —
/// a document is always produced.
pub struct OfficeWorker {
    gateway: Arc<dyn LlmGateway>,
    backend: Arc<dyn OfficeBackend>,
}

impl OfficeWorker {
    pub fn new(gateway: Arc<dyn LlmGateway>, backend: Arc<dyn OfficeBackend>) -> Self {
        Self { gateway, backend }
    }

    async fn generate_json(&self, request: &str) -> Option<serde_json::Value> {
        let raw = self
            .gateway
            .complete(ModelRole::Brain, OFFICE_SYSTEM_PROMPT, request, 2048)
            .await
            .ok()?;
        extract_json_object(&raw)
    }
}

#[async_trait]
impl Worker for OfficeWorker {
    fn name(&self) -> &'static str {
        "office"
    }

    async fn execute(&self, description: &str, ctx: &WorkerContext) -> Result<String> {
        let lower = description.to_lowercase();
        let kind = detect_kind(&lower);
        let (topic, out_dir) = split_task(description);
        tracing::info!(?kind, %topic, %out_dir, "office worker running");

        match kind {
            DocKind::Slides => {
                let request = format!(
                    "[TASK]\nCreate a professional presentation about: {topic}\n\n\
                     [CONTEXT INFORMATION]\n{}\n\n\
                     [FORMAT REQUIREMENTS]\n\
                     Generate a JSON object with 4-6 slides:\n\
                     {{\"title\": \"...\", \"subtitle\": \"...\", \"slides\": [{{\"title\": \"...\", \"content\": [\"point\", \"point\"]}}]}}\n\
                     Cover: overview, key features, architecture, value, roadmap.",
                    ctx.history
                );
                let deck = match self.generate_json(&request).await {
                    Some(v) => serde_json::from_value::<SlideDeck>(v)
                        .ok()
                        .filter(|d| !d.slides.is_empty())
                        .unwrap_or_else(|| SlideDeck::fallback(&topic)),
                    None => SlideDeck::fallback(&topic),
                };
                self.backend.create_slides(&deck, &out_dir).await
            }
            DocKind::Report => {
                let request = format!(
                    "[TASK]\nCreate a professional report about: {topic}\n\n\
                     [CONTEXT INFORMATION]\n{}\n\n\
                     [FORMAT REQUIREMENTS]\n\
                     Generate a JSON object:\n\
                     {{\"title\": \"...\", \"sections\": [{{\"heading\": \"...\", \"content\": \"...\"}}]}}\n\
                     Use 3-5 substantial sections.",
                    ctx.history
                );
                let doc = match self.generate_json(&request).await {
                    Some(v) => serde_json::from_value::<ReportDoc>(v)
                        .ok()
                        .filter(|d| !d.sections.is_empty())
                        .unwrap_or_else(|| ReportDoc::fallback(&topic)),
                    None => ReportDoc::fallback(&topic),
                };
                self.backend.create_report(&doc, &out_dir).await
            }
            DocKind::Sheet => {
                let request = format!(
                    "[TASK]\nCreate a data sheet about: {topic}\n\n\
                     [CONTEXT INFORMATION]\n{}\n\n\
                     [FORMAT REQUIREMENTS]\n\
                     Generate a JSON object:\n\
                     {{\"title\": \"...\", \"rows\": [{{\"Column\": \"value\"}}]}}\n\
                     Keep column names consistent across rows.",
                    ctx.history
                );
                let sheet = match self.generate_json(&request).await {
                    Some(v) => serde_json::from_value::<SheetData>(v)
                        .ok()
                        .filter(|s| !s.rows.is_empty())
                        .unwrap_or_else(|| SheetData::fallback(&topic)),
                    None => SheetData::fallback(&topic),
                };
                self.backend.create_sheet(&sheet, &out_dir).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DocKind, detect_kind, split_task};

    #[test]
    fn kind_detection() {
        assert_eq!(detect_kind("create_ppt: project intro"), DocKind::Slides);
        assert_eq!(detect_kind("엑셀로 통계 정리"), DocKind::Sheet);
        assert_eq!(detect_kind("write a proposal document"), DocKind::Report);
    }

    #[test]
    fn planner_task_format_is_split() {
        let (topic, folder) = split_task("create_ppt: MoaBot intro | decks");
        assert_eq!(topic, "MoaBot intro");
        assert_eq!(folder, "decks");
    }

    #[test]
    fn folder_defaults_to_output() {
        let (_, folder) = split_task("create_word: quarterly report");
        assert_eq!(folder, "output");
    }

    #[test]
    fn folder_pattern_extraction() {
        let (_, folder) = split_task("make slides in the 'decks' folder about rust");
        assert_eq!(folder, "decks");
    }
}
