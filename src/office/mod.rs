use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::cowork::workspace::WorkspaceContext;

// ── Document structures ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Slide {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlideDeck {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSection {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportDoc {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<ReportSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
}

impl SlideDeck {
    /// Structure used when the model's JSON cannot be parsed.
    pub fn fallback(topic: &str) -> Self {
        Self {
            title: topic.to_string(),
            subtitle: "Overview".to_string(),
            slides: vec![
                Slide {
                    title: "Overview".to_string(),
                    content: vec![format!("Introduction to {topic}")],
                },
                Slide {
                    title: "Details".to_string(),
                    content: vec!["Key points".to_string(), "Supporting facts".to_string()],
                },
                Slide {
                    title: "Summary".to_string(),
                    content: vec!["Conclusions and next steps".to_string()],
                },
            ],
        }
    }
}

impl ReportDoc {
    pub fn fallback(topic: &str) -> Self {
        Self {
            title: topic.to_string(),
            sections: vec![
                ReportSection {
                    heading: "Overview".to_string(),
                    content: format!("This report covers {topic}."),
                },
                ReportSection {
                    heading: "Conclusion".to_string(),
                    content: "Summary and next steps.".to_string(),
                },
            ],
        }
    }
}

impl SheetData {
    pub fn fallback(topic: &str) -> Self {
        let mut row = Map::new();
        row.insert("Info".to_string(), Value::String(format!("No data provided for {topic}")));
        Self {
            title: topic.to_string(),
            rows: vec![row],
        }
    }
}

// ── Backend contract ──────────────────────────────────────────────────────────

/// Document generators live outside the core; this is the request/response
/// boundary the OfficeWorker hands finished structures to.
#[async_trait]
pub trait OfficeBackend: Send + Sync {
    async fn create_slides(&self, deck: &SlideDeck, out_dir: &str) -> Result<String>;
    async fn create_report(&self, doc: &ReportDoc, out_dir: &str) -> Result<String>;
    async fn create_sheet(&self, sheet: &SheetData, out_dir: &str) -> Result<String>;
}

/// Markdown/CSV generator writing into the workspace sandbox.
pub struct MarkdownOffice {
    workspace: Arc<WorkspaceContext>,
}

impl MarkdownOffice {
    pub fn new(workspace: Arc<WorkspaceContext>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl OfficeBackend for MarkdownOffice {
    async fn create_slides(&self, deck: &SlideDeck, out_dir: &str) -> Result<String> {
        let mut out = format!("# {}\n\n_{}_\n", deck.title, deck.subtitle);
        for (i, slide) in deck.slides.iter().enumerate() {
            out.push_str(&format!("\n---\n\n## {}. {}\n\n", i + 1, slide.title));
            for point in &slide.content {
                out.push_str(&format!("- {point}\n"));
            }
        }
        let path = format!("{out_dir}/{}.slides.md", slug(&deck.title));
        self.workspace.write_file(&path, &out)?;
        Ok(format!("Created presentation with {} slides at {path}", deck.slides.len()))
    }

    async fn create_report(&self, doc: &ReportDoc, out_dir: &str) -> Result<String> {
        let mut out = format!("# {}\n", doc.title);
        for section in &doc.sections {
            if !section.heading.is_empty() {
                out.push_str(&format!("\n## {}\n\n", section.heading));
            }
            out.push_str(&section.content);
            out.push('\n');
        }
        let path = format!("{out_dir}/{}.report.md", slug(&doc.title));
        self.workspace.write_file(&path, &out)?;
        Ok(format!("Created report with {} sections at {path}", doc.sections.len()))
    }

    async fn create_sheet(&self, sheet: &SheetData, out_dir: &str) -> Result<String> {
        let headers: Vec<String> = sheet
            .rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        let mut out = headers.join(",");
        out.push('\n');
        for row in &sheet.rows {
            let cells: Vec<String> = headers
                .iter()
                .map(|h| csv_cell(row.get(h).unwrap_or(&Value::Null)))
                .collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        let path = format!("{out_dir}/{}.csv", slug(&sheet.title));
        self.workspace.write_file(&path, &out)?;
        Ok(format!("Created sheet with {} rows at {path}", sheet.rows.len()))
    }
}

fn csv_cell(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

fn slug(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() { "document".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{MarkdownOffice, OfficeBackend, SheetData, SlideDeck, slug};
    use crate::cowork::workspace::WorkspaceContext;

    fn office() -> (MarkdownOffice, Arc<WorkspaceContext>) {
        let dir = std::env::temp_dir().join(format!(
            "moabot-office-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        let ws = Arc::new(WorkspaceContext::new(dir).expect("workspace"));
        (MarkdownOffice::new(ws.clone()), ws)
    }

    #[test]
    fn slugs_are_filesystem_safe() {
        assert_eq!(slug("Project Intro: 2026!"), "project-intro--2026");
        assert_eq!(slug("***"), "document");
    }

    #[tokio::test]
    async fn slide_deck_writes_markdown() {
        let (office, ws) = office();
        let deck = SlideDeck::fallback("MoaBot");
        let status = office.create_slides(&deck, "output").await.expect("slides");
        assert!(status.contains("3 slides"));
        let written = ws.read_file("output/moabot.slides.md").expect("read");
        assert!(written.contains("## 1. Overview"));
    }

    #[tokio::test]
    async fn sheet_escapes_commas() {
        let (office, ws) = office();
        let mut sheet = SheetData::fallback("inventory");
        sheet.rows[0].insert(
            "Note".to_string(),
            serde_json::Value::String("a, b".to_string()),
        );
        office.create_sheet(&sheet, "output").await.expect("sheet");
        let written = ws.read_file("output/inventory.csv").expect("read");
        assert!(written.contains("\"a, b\""));
    }
}
