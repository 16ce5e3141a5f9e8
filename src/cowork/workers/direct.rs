use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::cowork::workers::{Worker, WorkerContext};
use crate::llm::gateway::{LlmGateway, ModelRole};

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Runs a task straight through the brain model, with prior task results as
/// context when available.
pub struct DirectWorker {
    gateway: Arc<dyn LlmGateway>,
}

impl DirectWorker {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Worker for DirectWorker {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn execute(&self, description: &str, ctx: &WorkerContext) -> Result<String> {
        let prompt = if ctx.history.is_empty() {
            description.to_string()
        } else {
            format!(
                "Previous task results:\n{}\n\nCurrent task: {description}\n\n\
                 Perform the current task using the context above.",
                ctx.history
            )
        };
        tracing::info!(task = %description, "direct worker running");
        self.gateway
            .complete(ModelRole::Brain, SYSTEM_PROMPT, &prompt, 1536)
            .await
    }
}
