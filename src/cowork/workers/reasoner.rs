use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::cowork::workers::{Worker, WorkerContext};
use crate::llm::gateway::{LlmGateway, ModelRole};

const REASONING_SYSTEM_PROMPT: &str =
    "You are a coding and math assistant. Write clean Python code or solve math problems step by step.";

/// Hands coding/math tasks to the specialist model and returns the raw
/// completion.
pub struct ReasonerWorker {
    gateway: Arc<dyn LlmGateway>,
}

impl ReasonerWorker {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    pub async fn solve(&self, prompt: &str) -> Result<String> {
        self.gateway
            .complete(ModelRole::Reasoner, REASONING_SYSTEM_PROMPT, prompt, 2048)
            .await
    }
}

#[async_trait]
impl Worker for ReasonerWorker {
    fn name(&self) -> &'static str {
        "reasoner"
    }

    async fn execute(&self, description: &str, _ctx: &WorkerContext) -> Result<String> {
        tracing::info!(task = %description, "reasoner worker running");
        self.solve(description).await
    }
}
