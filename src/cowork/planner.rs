use std::sync::Arc;

use crate::llm::extract_json_array;
use crate::llm::gateway::{LlmGateway, ModelRole};
use crate::types::AgentKind;

/// Description prefixes that pin a task to a worker family regardless of the
/// label the model emitted.
const TOOL_PREFIXES: &[&str] = &[
    "execute_command:",
    "search_web:",
    "search_news:",
    "get_weather:",
];
const OFFICE_PREFIXES: &[&str] = &["create_ppt:", "create_word:", "create_excel:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub description: String,
    pub agent: AgentKind,
}

/// Turns an open-ended goal into a typed task list via constrained
/// generation against the closed agent-label set.
pub struct Planner {
    gateway: Arc<dyn LlmGateway>,
}

impl Planner {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create_plan(&self, goal: &str, context: &str) -> Vec<PlannedTask> {
        let prompt = format!(
            "You are a task planner for an autonomous AI coworker.\n\
             Break the high-level goal into a short sequence of concrete, executable tasks.\n\
             The available agents are:\n\
             - 'research': ONLY for searching or reading local FILES (PDF, Markdown, docs). Do NOT use if the goal doesn't mention files.\n\
             - 'direct': summarizing, writing, general reasoning, addressing the user directly.\n\
             - 'tool': external data (weather, web search, news), shell commands.\n\
             - 'office': generating presentation/report/spreadsheet documents.\n\n\
             Context:\n{context}\n\n\
             Goal: \"{goal}\"\n\n\
             IMPORTANT:\n\
             - If the goal is a simple question (weather, time, greetings), use only 1 or 2 tasks.\n\
             - Do NOT use 'research' unless asked to read a file or search the workspace.\n\n\
             Return a LIST of tasks in JSON format. Example:\n\
             [\n\
               {{\"description\": \"List all files in the downloads folder\", \"agent\": \"tool\"}},\n\
               {{\"description\": \"Extract text from report.pdf\", \"agent\": \"research\"}},\n\
               {{\"description\": \"Summarize the extracted text\", \"agent\": \"direct\"}}\n\
             ]\n\
             Return ONLY the JSON list. No markdown, no explanation."
        );

        let raw = match self
            .gateway
            .complete(ModelRole::Brain, "You are a JSON generator.", &prompt, 768)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "planner model call failed");
                return fallback_plan(goal);
            }
        };

        match parse_plan(&raw) {
            Some(tasks) if !tasks.is_empty() => tasks,
            _ => {
                tracing::warn!("plan parse failed, falling back to a single direct task");
                fallback_plan(goal)
            }
        }
    }
}

fn fallback_plan(goal: &str) -> Vec<PlannedTask> {
    vec![PlannedTask {
        description: goal.to_string(),
        agent: AgentKind::Direct,
    }]
}

/// Locates the JSON list in the completion and post-validates every task.
pub fn parse_plan(raw: &str) -> Option<Vec<PlannedTask>> {
    let doc = extract_json_array(raw)?;
    let items = doc.as_array()?;
    let tasks = items
        .iter()
        .filter_map(|item| {
            let description = item.get("description")?.as_str()?.trim().to_string();
            if description.is_empty() {
                return None;
            }
            let labeled = item
                .get("agent")
                .and_then(|v| v.as_str())
                .and_then(AgentKind::parse)
                .unwrap_or(AgentKind::Direct);
            Some(PlannedTask {
                agent: validate_agent(&description, labeled),
                description,
            })
        })
        .collect::<Vec<_>>();
    Some(tasks)
}

/// A tool-call or office prefix in the description wins over the label the
/// model picked.
pub fn validate_agent(description: &str, labeled: AgentKind) -> AgentKind {
    let lower = description.to_lowercase();
    if TOOL_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return AgentKind::Tool;
    }
    if OFFICE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return AgentKind::Office;
    }
    labeled
}

#[cfg(test)]
mod tests {
    use super::{parse_plan, validate_agent};
    use crate::types::AgentKind;

    #[test]
    fn parses_plan_from_noisy_completion() {
        let raw = "Here is the plan:\n```json\n[\n {\"description\": \"Seoul weather\", \"agent\": \"tool\"},\n {\"description\": \"Summarize results\", \"agent\": \"direct\"}\n]\n```";
        let tasks = parse_plan(raw).expect("plan");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].agent, AgentKind::Tool);
        assert_eq!(tasks[1].agent, AgentKind::Direct);
    }

    #[test]
    fn tool_prefix_overrides_label() {
        assert_eq!(
            validate_agent("execute_command: uv --version", AgentKind::Direct),
            AgentKind::Tool
        );
        assert_eq!(
            validate_agent("get_weather: Seoul", AgentKind::Research),
            AgentKind::Tool
        );
    }

    #[test]
    fn office_prefix_overrides_label() {
        assert_eq!(
            validate_agent("create_ppt: Project intro | slides", AgentKind::Direct),
            AgentKind::Office
        );
    }

    #[test]
    fn unknown_agent_label_defaults_to_direct() {
        let raw = "[{\"description\": \"do something\", \"agent\": \"wizard\"}]";
        let tasks = parse_plan(raw).expect("plan");
        assert_eq!(tasks[0].agent, AgentKind::Direct);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_plan("no json here").is_none());
    }
}
