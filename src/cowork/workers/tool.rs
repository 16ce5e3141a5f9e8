use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::cowork::workers::{Worker, WorkerContext};
use crate::tools::dispatch::ToolDispatcher;

/// Keyword-to-tool inference over a task description. The heavyweight
/// argument work stays in the dispatcher.
pub fn infer_tool_hint(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));
    if has(&["version", "버전", "-v", "--version", "installed", "설치"]) {
        "execute_command"
    } else if has(&["파일", "files", "폴더", "directory", "dir", "목록", "list files"]) {
        "execute_command"
    } else if has(&["news", "latest", "뉴스", "소식"]) {
        "search_news"
    } else if has(&["weather", "날씨", "기온"]) {
        "get_weather"
    } else if has(&["time", "시간", "몇시"]) {
        "get_current_time"
    } else {
        // Search also covers "search"/"find" wording; it is the default too.
        "search_web"
    }
}

/// Executes tool tasks in raw-result mode: the structured outcome is
/// serialized as-is so the formatter renders it deterministically.
pub struct ToolWorker {
    dispatcher: Arc<ToolDispatcher>,
}

impl ToolWorker {
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Worker for ToolWorker {
    fn name(&self) -> &'static str {
        "tool"
    }

    async fn execute(&self, description: &str, _ctx: &WorkerContext) -> Result<String> {
        let hint = infer_tool_hint(description);
        tracing::info!(task = %description, tool = hint, "tool worker dispatching");
        let outcome = self.dispatcher.dispatch(description, hint, None).await;
        Ok(outcome.to_value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::infer_tool_hint;

    #[test]
    fn version_tasks_run_commands() {
        assert_eq!(infer_tool_hint("check uv version"), "execute_command");
        assert_eq!(infer_tool_hint("파이썬 버전 확인"), "execute_command");
    }

    #[test]
    fn news_beats_search() {
        assert_eq!(infer_tool_hint("Anthropic latest news"), "search_news");
    }

    #[test]
    fn weather_and_time() {
        assert_eq!(infer_tool_hint("Seoul weather"), "get_weather");
        assert_eq!(infer_tool_hint("what time is it"), "get_current_time");
    }

    #[test]
    fn default_is_web_search() {
        assert_eq!(infer_tool_hint("React"), "search_web");
    }
}
