pub mod direct;
pub mod office;
pub mod reasoner;
pub mod research;
pub mod tool;
pub mod writer;

use anyhow::Result;
use async_trait::async_trait;

/// Shared inputs a task execution may draw on.
#[derive(Debug, Clone, Default)]
pub struct WorkerContext {
    /// Concatenated results of earlier tasks (empty in the parallel phase —
    /// siblings never see each other).
    pub history: String,
    /// The user's original goal, in English.
    pub user_goal: String,
}

/// Typed task executor. Workers talk to models only through the narrow
/// `LlmGateway` seam, never through the orchestrator.
#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, description: &str, ctx: &WorkerContext) -> Result<String>;
}
