use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::cowork::workers::{Worker, WorkerContext};
use crate::rag::Retriever;

static FILE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\[(.*?)\]").expect("file-ref regex"));
static BARE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_\-./]+\.(?:md|txt|pdf|csv|py)").expect("bare-file regex")
});

/// Resolves `@[file]` references through the retrieval layer and returns the
/// retrieved context block. Unreadable references are logged and dropped —
/// the task continues without them.
pub struct ResearchWorker {
    retriever: Arc<dyn Retriever>,
    workspace_root: PathBuf,
}

impl ResearchWorker {
    pub fn new(retriever: Arc<dyn Retriever>, workspace_root: PathBuf) -> Self {
        Self {
            retriever,
            workspace_root,
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let direct = PathBuf::from(reference.trim());
        if direct.exists() {
            direct
        } else {
            self.workspace_root.join(reference.trim())
        }
    }
}

#[async_trait]
impl Worker for ResearchWorker {
    fn name(&self) -> &'static str {
        "research"
    }

    async fn execute(&self, description: &str, _ctx: &WorkerContext) -> Result<String> {
        let mut refs: Vec<String> = FILE_REF
            .captures_iter(description)
            .map(|c| c[1].to_string())
            .collect();
        if refs.is_empty() {
            refs = BARE_FILE
                .find_iter(description)
                .map(|m| m.as_str().to_string())
                .collect();
        }

        let mut ingested = Vec::new();
        for reference in &refs {
            let path = self.resolve(reference);
            match self.retriever.ingest(&path).await {
                Ok(status) => {
                    tracing::info!(file = %reference, %status, "research ingest");
                    ingested.push(reference.clone());
                }
                Err(e) => {
                    tracing::warn!(file = %reference, error = %e, "dropping unreadable reference");
                }
            }
        }

        let clean_query = FILE_REF.replace_all(description, "").trim().to_string();
        let context = self.retriever.query(&clean_query).await.unwrap_or_default();
        if context.is_empty() {
            return Ok("No relevant context found in the referenced documents.".to_string());
        }
        let sources = if ingested.is_empty() {
            "workspace documents".to_string()
        } else {
            ingested.join(", ")
        };
        Ok(format!("[Context from {sources}]\n{context}"))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::ResearchWorker;
    use crate::cowork::workers::{Worker, WorkerContext};
    use crate::rag::KeywordStore;

    #[tokio::test]
    async fn ingests_referenced_file_and_returns_context() {
        let dir = std::env::temp_dir().join(format!(
            "moabot-research-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).expect("tmp dir");
        std::fs::write(dir.join("notes.md"), "The launch window opens on Friday.").expect("write");

        let worker = ResearchWorker::new(Arc::new(KeywordStore::new()), dir.clone());
        let out = worker
            .execute("when is the launch @[notes.md]", &WorkerContext::default())
            .await
            .expect("execute");
        assert!(out.contains("launch window"));
        assert!(out.contains("notes.md"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_reference_degrades_gracefully() {
        let worker = ResearchWorker::new(Arc::new(KeywordStore::new()), PathBuf::from("/nonexistent"));
        let out = worker
            .execute("summarize @[ghost.md]", &WorkerContext::default())
            .await
            .expect("execute");
        assert!(out.contains("No relevant context"));
    }
}
