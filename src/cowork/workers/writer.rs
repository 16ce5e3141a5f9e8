use std::sync::{Arc, LazyLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::cowork::workers::{Worker, WorkerContext};
use crate::cowork::workspace::WorkspaceContext;
use crate::llm::gateway::{LlmGateway, ModelRole};

pub const DEFAULT_REPORT_PATH: &str = "docs/cowork_result.md";

static TARGET_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_\-./]+\.(?:md|txt|csv)").expect("target-file regex")
});

/// Prompts the brain for a polished final document and writes it into the
/// workspace.
pub struct WriterWorker {
    gateway: Arc<dyn LlmGateway>,
    workspace: Arc<WorkspaceContext>,
}

impl WriterWorker {
    pub fn new(gateway: Arc<dyn LlmGateway>, workspace: Arc<WorkspaceContext>) -> Self {
        Self { gateway, workspace }
    }
}

/// A filename in the task description overrides the default report path.
pub fn target_path(description: &str) -> String {
    TARGET_FILE
        .find(description)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string())
}

#[async_trait]
impl Worker for WriterWorker {
    fn name(&self) -> &'static str {
        "writer"
    }

    async fn execute(&self, description: &str, ctx: &WorkerContext) -> Result<String> {
        let prompt = format!(
            "You are a professional writer.\n\
             Goal: {}\n\n\
             Previous context/results:\n{}\n\n\
             Current task: {description}\n\n\
             Write a high-quality, comprehensive final report or content based on the above.\n\
             Return ONLY the content to be saved.",
            ctx.user_goal, ctx.history
        );
        let content = self
            .gateway
            .complete(ModelRole::Brain, "You are a professional writer.", &prompt, 2048)
            .await?;

        let target = target_path(description);
        self.workspace.write_file(&target, &content)?;
        tracing::info!(%target, bytes = content.len(), "writer saved document");
        Ok(format!("Saved to {target}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_REPORT_PATH, target_path};

    #[test]
    fn filename_in_description_wins() {
        assert_eq!(target_path("save the summary to notes/summary.md"), "notes/summary.md");
    }

    #[test]
    fn default_path_otherwise() {
        assert_eq!(target_path("write the final report"), DEFAULT_REPORT_PATH);
    }
}
