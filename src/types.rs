use serde::{Deserialize, Serialize};

// ── Routing ───────────────────────────────────────────────────────────────────

/// How a request should be served: the local brain model, an external tool,
/// or the specialist reasoning model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Direct,
    Tool,
    Reasoner,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Direct => "DIRECT",
            Route::Tool => "TOOL",
            Route::Reasoner => "REASONER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Some(Route::Direct),
            "TOOL" => Some(Route::Tool),
            "REASONER" => Some(Route::Reasoner),
            _ => None,
        }
    }
}

/// A single routing verdict. `tool_hint` is only ever populated on the Tool
/// route; the constructors below are the sole way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub kind: Route,
    pub tool_hint: Option<String>,
    pub arg_hint: Option<String>,
    pub description: Option<String>,
}

impl RouteDecision {
    pub fn direct() -> Self {
        Self {
            kind: Route::Direct,
            tool_hint: None,
            arg_hint: None,
            description: None,
        }
    }

    pub fn reasoner(prompt: impl Into<String>) -> Self {
        Self {
            kind: Route::Reasoner,
            tool_hint: None,
            arg_hint: Some(prompt.into()),
            description: None,
        }
    }

    pub fn tool(hint: impl Into<String>, arg_hint: Option<String>) -> Self {
        Self {
            kind: Route::Tool,
            tool_hint: Some(hint.into()),
            arg_hint,
            description: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// One step of a multi-step pipeline. `context_from_step` always points at an
/// earlier step; `PipelineStep::chained` keeps that invariant by construction.
#[derive(Debug, Clone)]
pub struct PipelineStep {
    pub index: usize,
    pub decision: RouteDecision,
    pub context_from_step: Option<usize>,
    pub description: String,
}

impl PipelineStep {
    pub fn first(decision: RouteDecision, description: impl Into<String>) -> Self {
        Self {
            index: 1,
            decision,
            context_from_step: None,
            description: description.into(),
        }
    }

    /// A follow-up step consuming the output of an earlier step.
    pub fn chained(
        index: usize,
        decision: RouteDecision,
        prev: usize,
        description: impl Into<String>,
    ) -> Self {
        Self {
            index,
            decision,
            context_from_step: Some(prev.min(index.saturating_sub(1))),
            description: description.into(),
        }
    }
}

// ── Cowork agents ─────────────────────────────────────────────────────────────

/// Worker family a planned task is assigned to. `Tool` and `Research` tasks
/// form the independent (parallelizable) set; the rest run sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Direct,
    Tool,
    Reasoner,
    Research,
    Writer,
    Office,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Direct => "direct",
            AgentKind::Tool => "tool",
            AgentKind::Reasoner => "reasoner",
            AgentKind::Research => "research",
            AgentKind::Writer => "writer",
            AgentKind::Office => "office",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "brain" => Some(AgentKind::Direct),
            "tool" => Some(AgentKind::Tool),
            "reasoner" => Some(AgentKind::Reasoner),
            "research" | "rag" => Some(AgentKind::Research),
            "writer" => Some(AgentKind::Writer),
            "office" => Some(AgentKind::Office),
            _ => None,
        }
    }

    /// True for agents that may run inside the parallel phase.
    pub fn is_independent(self) -> bool {
        matches!(self, AgentKind::Tool | AgentKind::Research)
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentKind, PipelineStep, Route, RouteDecision};

    #[test]
    fn tool_decision_carries_hint() {
        let d = RouteDecision::tool("get_weather", Some("Seoul".into()));
        assert_eq!(d.kind, Route::Tool);
        assert_eq!(d.tool_hint.as_deref(), Some("get_weather"));
    }

    #[test]
    fn non_tool_decisions_never_carry_hints() {
        assert!(RouteDecision::direct().tool_hint.is_none());
        assert!(RouteDecision::reasoner("x").tool_hint.is_none());
    }

    #[test]
    fn chained_step_references_earlier_step() {
        let s = PipelineStep::chained(2, RouteDecision::direct(), 1, "summarize");
        assert!(s.context_from_step.unwrap() < s.index);
    }

    #[test]
    fn agent_kind_aliases() {
        assert_eq!(AgentKind::parse("brain"), Some(AgentKind::Direct));
        assert_eq!(AgentKind::parse("rag"), Some(AgentKind::Research));
        assert!(AgentKind::Tool.is_independent());
        assert!(!AgentKind::Writer.is_independent());
    }
}
