use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::llm::gateway::{LlmGateway, ModelRole};
use crate::llm::extract_json_object;
use crate::types::{Route, RouteDecision};

const ROUTER_SYSTEM_PROMPT: &str = "\
You are a task router. Analyze the user's request and decide how to handle it.

Available specialists:
- REASONER: STRICTLY for pure coding tasks (writing functions/classes) and complex algorithmic/math problems only. Do NOT use for summarizing, explaining, reading files, checking versions, or general info.
- TOOL: For requests requiring external information (weather, news, definitions), system status, version checks, or real-time data.
- DIRECT: For general conversation, summaries, explanations, greetings, translations, and internal knowledge.

Respond with a JSON object:
{\"route\": \"REASONER\" or \"TOOL\" or \"DIRECT\", \"specialist_prompt\": \"optimized search keywords for TOOL. For 'execute_command', provide the EXACT shell command, never a natural-language description.\", \"tool_hint\": \"tool name if TOOL route\"}

Examples:
- \"Write a Fibonacci function\" -> {\"route\": \"REASONER\", \"specialist_prompt\": \"Write a Python function for the Fibonacci sequence\", \"tool_hint\": \"\"}
- \"Summarize this document\" -> {\"route\": \"DIRECT\", \"specialist_prompt\": \"\", \"tool_hint\": \"\"}
- \"How is the weather in Seoul?\" -> {\"route\": \"TOOL\", \"specialist_prompt\": \"Seoul\", \"tool_hint\": \"get_weather\"}
- \"What is the uv python tool?\" -> {\"route\": \"TOOL\", \"specialist_prompt\": \"what is uv python tool\", \"tool_hint\": \"search_web\"}";

// ── Fast-path keyword tables ──────────────────────────────────────────────────

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(202[3-9]|203[0-9])년?").expect("year regex"));
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:gpt|claude|moa|iphone|gemini|llama|mistral|qwen|v\.)[- ]?\d")
        .expect("version regex")
});

const RECENT_KEYWORDS: &[&str] = &[
    "최신", "최근", "latest", "newest", "recent", "올해", "지난주", "어제",
];

const DIRECT_FAST: &[&str] = &[
    "안녕", "hello", "hi ", "고마워", "감사", "thanks", "thank you", "반가워", "bye", "안녕히",
    "요약해줘", "요약해", "정리해줘", "summarize", "summary", "번역해줘", "translate", "설명해줘",
    "explain", "차이점", "difference",
];

const CONCEPT_PATTERNS: &[&str] = &["뭐야", "뭘까", "what is", "what's"];

const TECH_TERMS: &[&str] = &[
    "uv", "docker", "kubernetes", "npm", "pip", "git", "rust", "cargo", "langchain", "pytorch",
    "tensorflow", "react", "vue", "angular",
];

const TOOLISH_KEYWORDS: &[&str] = &[
    "날씨", "weather", "뉴스", "news", "검색", "search", "시간", "time", "버전", "version",
];

const CALC_KEYWORDS: &[&str] = &[
    "더해", "빼줘", "곱해", "나눠", "계산해", "calculate", "+", "-", "*", "/",
];

const REASONER_FAST: &[&str] = &[
    "함수 작성", "알고리즘 구현", "코드 작성", "피보나치", "fibonacci", "퀵소트", "quicksort",
    "aime", "문제 풀", "버그 찾", "디버깅", "debug", "최적화해줘", "optimize", "sql 쿼리",
];

const CREATION_KEYWORDS: &[&str] = &[
    "write", "code", "create", "generate", "function", "script", "class", "impl", "작성", "만들",
    "구현", "짜줘",
];

const HISTORICAL_KEYWORDS: &[&str] = &[
    "yesterday", "last week", "history", "past", "어제", "지난", "과거", "작년",
];

/// Ordered tool keyword tables; first hit wins.
const FAST_TOOLS: &[(&str, &[&str])] = &[
    ("get_weather", &["날씨", "weather", "기온", "온도"]),
    (
        "search_news",
        &["뉴스", "news", "기사", "article", "소식", "보도", "발표", "search_news"],
    ),
    ("search_web", &["검색", "search", "정보", "info", "search_web"]),
    ("get_current_time", &["시간", "time", "몇시", "date", "오늘"]),
    (
        "execute_command",
        &["version", "버전", "check", "확인", "실행", "run", "installed", "설치", "status", "환경"],
    ),
];

const COMMAND_TARGETS: &[&str] = &[
    "python", "uv", "pip", "node", "npm", "git", "docker", "system", "os",
];

const FALLBACK_DIRECT: &[&str] = &[
    "요약", "정리", "설명", "summarize", "explain", "translate", "번역", "안녕", "hello", "hi",
    "반가워",
];

const FALLBACK_REASONER: &[&str] = &[
    "함수", "알고리즘", "수학", "증명", "aime", "fibonacci", "script", "class",
];

fn any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Two-tier request classifier: deterministic keyword rules first, a
/// constrained brain-model prompt only when no rule fires. Always produces
/// exactly one decision and never asks the user anything.
pub struct Router {
    gateway: Arc<dyn LlmGateway>,
}

impl Router {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    pub async fn route(&self, input: &str) -> RouteDecision {
        if let Some(decision) = fast_route(input) {
            return decision;
        }
        match self.llm_route(input).await {
            Some(decision) => decision,
            None => fallback_route(input),
        }
    }

    async fn llm_route(&self, input: &str) -> Option<RouteDecision> {
        let raw = self
            .gateway
            .complete(ModelRole::Brain, ROUTER_SYSTEM_PROMPT, input, 256)
            .await
            .ok()?;
        let doc = extract_json_object(&raw)?;
        let route = Route::parse(doc.get("route")?.as_str()?)?;
        let prompt = doc
            .get("specialist_prompt")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let hint = doc
            .get("tool_hint")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match route {
            Route::Tool => hint.map(|h| RouteDecision::tool(h, prompt)),
            Route::Reasoner => Some(RouteDecision::reasoner(
                prompt.unwrap_or_else(|| input.to_string()),
            )),
            Route::Direct => Some(RouteDecision::direct()),
        }
    }
}

/// Tier A: ordered deterministic rules. Returns None when no rule fires.
pub fn fast_route(input: &str) -> Option<RouteDecision> {
    let lower = input.to_lowercase();

    // Recency signals outrun the model's knowledge cutoff; search instead.
    if YEAR_RE.is_match(input) || VERSION_RE.is_match(&lower) || any(&lower, RECENT_KEYWORDS) {
        return Some(RouteDecision::tool("search_web", Some(input.to_string())));
    }

    if any(&lower, DIRECT_FAST) {
        return Some(RouteDecision::direct());
    }

    // Concept questions: known tech terms need a search, plain concepts don't.
    if any(&lower, CONCEPT_PATTERNS) {
        if any(&lower, TECH_TERMS) {
            return Some(RouteDecision::tool("search_web", Some(input.to_string())));
        }
        if !any(&lower, TOOLISH_KEYWORDS) {
            return Some(RouteDecision::direct());
        }
    }

    if any(&lower, CALC_KEYWORDS) {
        return Some(RouteDecision::tool("calculate", Some(input.to_string())));
    }

    if any(&lower, REASONER_FAST) {
        return Some(RouteDecision::reasoner(input));
    }

    // Creation-flavored requests may be coding work; leave them to the model.
    if any(&lower, CREATION_KEYWORDS) {
        return None;
    }

    let is_historical = any(&lower, HISTORICAL_KEYWORDS);
    for (tool, keywords) in FAST_TOOLS {
        if !any(&lower, keywords) {
            continue;
        }
        // The weather backend has no history; route past-tense weather to search.
        if *tool == "get_weather" && is_historical {
            return Some(RouteDecision::tool("search_web", Some(input.to_string())));
        }
        if *tool == "execute_command" {
            if any(&lower, COMMAND_TARGETS) || lower.contains("ls") || lower.contains("dir") {
                // Command synthesis is the dispatcher's job; no raw-text hint.
                return Some(RouteDecision::tool("execute_command", None));
            }
            continue;
        }
        return Some(RouteDecision::tool(*tool, Some(input.to_string())));
    }

    None
}

/// Secondary keyword pass after an unparseable model verdict.
pub fn fallback_route(input: &str) -> RouteDecision {
    let lower = input.to_lowercase();
    let is_creation = any(&lower, CREATION_KEYWORDS);

    if any(&lower, FALLBACK_DIRECT) && !is_creation {
        return RouteDecision::direct();
    }

    let mentions_code = lower.contains("python") || lower.contains("코드") || lower.contains("code");
    let mentions_ops = any(&lower, &["version", "check", "확인", "버전", "summarize", "요약"]);
    if mentions_code && !mentions_ops {
        return RouteDecision::reasoner(input);
    }

    if any(&lower, FALLBACK_REASONER) && !any(&lower, FALLBACK_DIRECT) {
        return RouteDecision::reasoner(input);
    }

    RouteDecision::direct()
}

#[cfg(test)]
mod tests {
    use super::{fallback_route, fast_route};
    use crate::types::Route;

    #[test]
    fn weather_routes_to_weather_tool() {
        let d = fast_route("Seoul weather?").expect("fast path");
        assert_eq!(d.kind, Route::Tool);
        assert_eq!(d.tool_hint.as_deref(), Some("get_weather"));
        assert_eq!(d.arg_hint.as_deref(), Some("Seoul weather?"));
    }

    #[test]
    fn version_check_routes_to_command_without_hint() {
        let d = fast_route("uv version?").expect("fast path");
        assert_eq!(d.tool_hint.as_deref(), Some("execute_command"));
        assert!(d.arg_hint.is_none());
    }

    #[test]
    fn recent_year_forces_search() {
        let d = fast_route("What happened at the 2025 conference?").expect("fast path");
        assert_eq!(d.tool_hint.as_deref(), Some("search_web"));
    }

    #[test]
    fn product_version_pattern_forces_search() {
        let d = fast_route("Tell me about gpt-5").expect("fast path");
        assert_eq!(d.tool_hint.as_deref(), Some("search_web"));
    }

    #[test]
    fn greetings_are_direct() {
        assert_eq!(fast_route("hello there").expect("fast path").kind, Route::Direct);
    }

    #[test]
    fn historical_weather_reroutes_to_search() {
        let d = fast_route("how was the weather yesterday").expect("fast path");
        assert_eq!(d.tool_hint.as_deref(), Some("search_web"));
    }

    #[test]
    fn tech_concept_question_searches() {
        let d = fast_route("what is docker").expect("fast path");
        assert_eq!(d.tool_hint.as_deref(), Some("search_web"));
    }

    #[test]
    fn plain_concept_question_is_direct() {
        assert_eq!(fast_route("what is love").expect("fast path").kind, Route::Direct);
    }

    #[test]
    fn arithmetic_routes_to_calculator() {
        let d = fast_route("1 + 2 * 3").expect("fast path");
        assert_eq!(d.tool_hint.as_deref(), Some("calculate"));
    }

    #[test]
    fn named_algorithm_routes_to_reasoner() {
        assert_eq!(fast_route("quicksort please").expect("fast path").kind, Route::Reasoner);
    }

    #[test]
    fn creation_requests_skip_fast_tools() {
        // "create" blocks the tool tables so the model can weigh coding intent.
        assert!(fast_route("create a status page").is_none());
    }

    #[test]
    fn fallback_defaults_to_direct() {
        assert_eq!(fallback_route("mysterious input").kind, Route::Direct);
    }

    #[test]
    fn fallback_code_mention_is_reasoner() {
        assert_eq!(fallback_route("python generator tricks").kind, Route::Reasoner);
    }
}
