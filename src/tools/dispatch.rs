use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::llm::extract_json_object;
use crate::llm::gateway::{LlmGateway, ModelRole};
use crate::tools::executor::{ToolInvoker, ToolOutcome, ToolPayload, normalize_city};

/// A payload that claims success can still describe a failure; these markers
/// reclassify it. The bare word "error" is too common in ordinary prose to
/// be one of them.
const SEMANTIC_ERROR_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "rate limit",
    "api error",
    "access denied",
    "404 not found",
    "500 internal server error",
    "traceback",
];

/// Natural-language openers that disqualify a string from being a command.
const INSTRUCTION_VERBS: &[&str] = &[
    "Check", "Verify", "Confirm", "Please", "Ensure", "See", "Test", "Determine",
];

static CJK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Hangul}\p{Han}\p{Hiragana}\p{Katakana}]").expect("cjk regex")
});
static EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d\s+*/().-]+").expect("expression regex"));

/// City → IANA timezone shortcuts for time questions phrased around places.
const CITY_TIMEZONES: &[(&str, &str)] = &[
    ("서울", "Asia/Seoul"),
    ("seoul", "Asia/Seoul"),
    ("도쿄", "Asia/Tokyo"),
    ("tokyo", "Asia/Tokyo"),
    ("뉴욕", "America/New_York"),
    ("new york", "America/New_York"),
    ("런던", "Europe/London"),
    ("london", "Europe/London"),
];

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Validates, repairs, and executes tool calls. One LLM repair round per
/// original invocation, never more: the retry is a straight second call
/// guarded by a sentinel argument, not a recursion.
pub struct ToolDispatcher {
    invoker: Arc<dyn ToolInvoker>,
    repairer: Repairer,
}

impl ToolDispatcher {
    pub fn new(invoker: Arc<dyn ToolInvoker>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            invoker,
            repairer: Repairer::new(gateway),
        }
    }

    /// Full dispatch pipeline. `user_text` is the (English) request the hint
    /// was derived from; it feeds keyword inference and the repair prompt.
    pub async fn dispatch(
        &self,
        user_text: &str,
        tool_hint: &str,
        arg_hint: Option<&str>,
    ) -> ToolOutcome {
        // 1. Argument acquisition: router hint first, keyword inference after.
        let call = arg_hint
            .and_then(|hint| map_hint_to_args(tool_hint, hint))
            .map(|args| (tool_hint.to_string(), args))
            .or_else(|| infer_tool_call(user_text, tool_hint));

        let Some((tool, args)) = call else {
            return ToolOutcome::Failure {
                tool: tool_hint.to_string(),
                arguments: Map::new(),
                error: "Could not infer tool arguments from the request".to_string(),
            };
        };

        // 2. Schema repair (foreign keys renamed to the canonical one).
        let args = repair_argument_keys(&tool, args);

        // 3–4. Invoke, then scan the payload for soft failures.
        tracing::debug!(%tool, ?args, "tool dispatch");
        let outcome = self.invoke_checked(&tool, &args).await;
        if outcome.succeeded() {
            return outcome;
        }

        // 5. One repair round.
        let error = outcome.error().unwrap_or("Unknown error").to_string();
        tracing::warn!(%tool, %error, "tool failed, asking the model for corrected arguments");
        let Some(mut corrected) = self.repairer.corrected_args(&tool, &args, &error, user_text).await
        else {
            return outcome;
        };
        // Sentinel prevents any further repair on the second pass.
        corrected.insert("retry".to_string(), json!(true));
        self.invoke_checked(&tool, &corrected).await
    }

    async fn invoke_checked(&self, tool: &str, args: &Map<String, Value>) -> ToolOutcome {
        let outcome = self.invoker.invoke(tool, args).await;
        apply_semantic_check(outcome)
    }
}

/// Reclassifies "successful" outcomes whose payload smells like a failure.
pub fn apply_semantic_check(outcome: ToolOutcome) -> ToolOutcome {
    let (tool, arguments, payload) = match outcome {
        ToolOutcome::Success {
            tool,
            arguments,
            payload,
        } => (tool, arguments, payload),
        failure => return failure,
    };

    // A command that exited non-zero is a failure regardless of transport.
    if let ToolPayload::Command(cmd) = &payload
        && !cmd.success
    {
        let detail = if cmd.stderr.is_empty() {
            format!("exit code {}", cmd.return_code)
        } else {
            cmd.stderr.clone()
        };
        return ToolOutcome::Failure {
            tool,
            arguments,
            error: format!("Command failed: {detail}"),
        };
    }

    let haystack = payload.to_value().to_string().to_lowercase();
    if let Some(marker) = SEMANTIC_ERROR_MARKERS.iter().find(|m| haystack.contains(*m)) {
        return ToolOutcome::Failure {
            tool,
            arguments,
            error: format!("Tool returned success but contained error keyword: {marker}"),
        };
    }

    ToolOutcome::Success {
        tool,
        arguments,
        payload,
    }
}

// ── Argument acquisition ──────────────────────────────────────────────────────

/// Maps a router argument hint onto the tool's canonical parameter. Returns
/// None when the hint is unusable and keyword inference should take over.
pub fn map_hint_to_args(tool: &str, hint: &str) -> Option<Map<String, Value>> {
    let hint = hint.trim();
    if hint.is_empty() {
        return None;
    }
    let mut args = Map::new();
    match tool {
        "search_web" | "search_news" | "search_wikipedia" => {
            args.insert("query".to_string(), json!(hint));
        }
        "get_weather" => {
            args.insert("location".to_string(), json!(normalize_city(hint)));
        }
        "execute_command" => {
            if !is_plausible_command(hint) {
                tracing::warn!(%hint, "argument hint looks like prose, not a command");
                return None;
            }
            args.insert("command".to_string(), json!(hint));
        }
        "get_current_time" => {
            let tz = if hint.contains('/') {
                hint.to_string()
            } else {
                city_timezone(hint)?
            };
            args.insert("timezone".to_string(), json!(tz));
        }
        "calculate" => {
            args.insert("expression".to_string(), json!(extract_expression(hint)?));
        }
        "read_url" => {
            args.insert("url".to_string(), json!(hint));
        }
        other => {
            let param = crate::tools::schema::canonical_param(other)?;
            args.insert(param.to_string(), json!(hint));
        }
    }
    Some(args)
}

/// A hint that opens with an instruction verb and runs past two words, or
/// carries CJK text, is a description of a command — not a command.
pub fn is_plausible_command(hint: &str) -> bool {
    let word_count = hint.split_whitespace().count();
    if INSTRUCTION_VERBS.iter().any(|v| hint.starts_with(v)) && word_count > 2 {
        return false;
    }
    !CJK_RE.is_match(hint)
}

fn city_timezone(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    CITY_TIMEZONES
        .iter()
        .find(|(city, _)| lower.contains(city))
        .map(|(_, tz)| (*tz).to_string())
}

fn extract_expression(text: &str) -> Option<String> {
    EXPR_RE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| s.chars().any(|c| c.is_ascii_digit()))
        .max_by_key(|s| s.len())
}

// ── Keyword inference ─────────────────────────────────────────────────────────

/// Model-free fallback: derive a complete tool call from the request text.
pub fn infer_tool_call(user_text: &str, tool_hint: &str) -> Option<(String, Map<String, Value>)> {
    let lower = user_text.to_lowercase();
    let mut args = Map::new();

    match tool_hint {
        "get_weather" => {
            args.insert("location".to_string(), json!(city_from_text(&lower)));
            return Some(("get_weather".to_string(), args));
        }
        "search_web" | "search_news" | "search_wikipedia" => {
            args.insert("query".to_string(), json!(strip_search_prefixes(user_text)));
            return Some((tool_hint.to_string(), args));
        }
        "get_current_time" => {
            let tz = city_timezone(&lower).unwrap_or_else(|| "Asia/Seoul".to_string());
            args.insert("timezone".to_string(), json!(tz));
            return Some(("get_current_time".to_string(), args));
        }
        "calculate" => {
            args.insert("expression".to_string(), json!(extract_expression(user_text)?));
            return Some(("calculate".to_string(), args));
        }
        "execute_command" => {
            args.insert("command".to_string(), json!(synthesize_command(&lower)));
            return Some(("execute_command".to_string(), args));
        }
        "read_url" => {
            let url = user_text.split_whitespace().find(|w| w.starts_with("http"))?;
            args.insert("url".to_string(), json!(url));
            return Some(("read_url".to_string(), args));
        }
        _ => {}
    }

    // No usable hint: pick a tool from the request itself.
    if ["weather", "날씨", "기온", "온도"].iter().any(|k| lower.contains(k)) {
        args.insert("location".to_string(), json!(city_from_text(&lower)));
        return Some(("get_weather".to_string(), args));
    }
    if ["version", "버전", "check", "확인", "installed", "설치"]
        .iter()
        .any(|k| lower.contains(k))
        && !lower.contains("코드")
    {
        args.insert("command".to_string(), json!(synthesize_command(&lower)));
        return Some(("execute_command".to_string(), args));
    }
    if ["time", "시간", "몇시"].iter().any(|k| lower.contains(k)) {
        let tz = city_timezone(&lower).unwrap_or_else(|| "Asia/Seoul".to_string());
        args.insert("timezone".to_string(), json!(tz));
        return Some(("get_current_time".to_string(), args));
    }
    if ["search", "find", "검색", "찾아", "알려줘"].iter().any(|k| lower.contains(k)) {
        args.insert("query".to_string(), json!(strip_search_prefixes(user_text)));
        return Some(("search_web".to_string(), args));
    }
    None
}

/// Builds the shell command a version/listing request is really asking for.
/// Both `uv` and `python` mentioned means both versions in one call.
pub fn synthesize_command(lower: &str) -> String {
    let wants_version = ["version", "버전", "-v", "--version", "installed", "설치"]
        .iter()
        .any(|k| lower.contains(k));
    if wants_version {
        let has_uv = lower.contains("uv");
        let has_python = lower.contains("python") || lower.contains("파이썬");
        return if has_uv && has_python {
            "uv --version && python --version".to_string()
        } else if has_uv {
            "uv --version".to_string()
        } else if has_python {
            "python --version".to_string()
        } else if lower.contains("node") {
            "node --version".to_string()
        } else if lower.contains("npm") {
            "npm --version".to_string()
        } else if lower.contains("git") {
            "git --version".to_string()
        } else {
            "uv --version && python --version".to_string()
        };
    }
    if ["파일", "files", "폴더", "directory", "목록", "ls", "dir", "list"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return if cfg!(target_os = "windows") {
            "dir".to_string()
        } else {
            "ls -la".to_string()
        };
    }
    "uv --version && python --version".to_string()
}

pub(crate) fn city_from_text(lower: &str) -> String {
    for (korean, english) in crate::tools::executor::CITY_MAP {
        if lower.contains(korean) || lower.contains(&english.to_lowercase()) {
            return (*english).to_string();
        }
    }
    "Seoul".to_string()
}

fn strip_search_prefixes(text: &str) -> String {
    let mut query = text.to_string();
    for prefix in ["검색해줘", "찾아봐", "알려줘", "뭐야", "search for", "search"] {
        if let Some(idx) = query.to_lowercase().find(prefix) {
            // Lowercasing keeps byte offsets for these prefixes; the boundary
            // check guards the exotic cases where it would not.
            let end = idx + prefix.len();
            if query.is_char_boundary(idx) && query.is_char_boundary(end) {
                query.replace_range(idx..end, "");
            }
            break;
        }
    }
    let trimmed = query.trim().trim_matches(|c: char| "?.!,".contains(c)).trim();
    if trimmed.is_empty() { text.to_string() } else { trimmed.to_string() }
}

// ── Schema repair ─────────────────────────────────────────────────────────────

/// Renames foreign argument keys to the tool's canonical parameter
/// (`location` on a search, `query` on the weather tool).
pub fn repair_argument_keys(tool: &str, mut args: Map<String, Value>) -> Map<String, Value> {
    match tool {
        "search_web" | "search_news" | "search_wikipedia" => {
            if !args.contains_key("query")
                && let Some(v) = args.remove("location")
            {
                tracing::warn!(%tool, "renaming argument: location -> query");
                args.insert("query".to_string(), v);
            }
        }
        "get_weather" => {
            if !args.contains_key("location")
                && let Some(v) = args.remove("query")
            {
                tracing::warn!(%tool, "renaming argument: query -> location");
                args.insert("location".to_string(), v);
            }
        }
        _ => {}
    }
    args
}

// ── Repairer ──────────────────────────────────────────────────────────────────

/// LLM-backed argument repair with an explicit one-call budget.
pub struct Repairer {
    gateway: Arc<dyn LlmGateway>,
}

impl Repairer {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    pub async fn corrected_args(
        &self,
        tool: &str,
        failed_args: &Map<String, Value>,
        error: &str,
        user_text: &str,
    ) -> Option<Map<String, Value>> {
        let prompt = format!(
            "The tool '{tool}' failed with arguments '{}'.\n\
             Error: \"{error}\".\n\
             The user wants to: \"{user_text}\".\n\
             Provide CORRECTED arguments for the tool '{tool}' to fix this error.\n\
             Return ONLY the JSON arguments (e.g. {{\"location\": \"Seoul\"}} or {{\"command\": \"python --version\"}}). Do NOT explain.",
            Value::Object(failed_args.clone()),
        );
        let system = format!(
            "You are a tool expert. Provide only the corrected JSON arguments.\n\n\
             Available tools:\n{}",
            crate::tools::schema::tools_prompt()
        );
        let raw = self
            .gateway
            .complete(ModelRole::Brain, &system, &prompt, 256)
            .await
            .ok()?;
        parse_repair_output(tool, &raw)
    }
}

/// A bare string from the repair model is a command for `execute_command`;
/// anything else must be a JSON object.
pub fn parse_repair_output(tool: &str, raw: &str) -> Option<Map<String, Value>> {
    if let Some(Value::Object(map)) = extract_json_object(raw) {
        return Some(map);
    }
    let stripped = raw.replace("```json", "").replace("```", "").trim().to_string();
    if tool == "execute_command" && !stripped.is_empty() && !stripped.starts_with('{') {
        let mut map = Map::new();
        map.insert("command".to_string(), json!(stripped));
        return Some(map);
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::{
        infer_tool_call, is_plausible_command, map_hint_to_args, parse_repair_output,
        repair_argument_keys, synthesize_command,
    };
    use crate::tools::executor::{CommandOutput, ToolOutcome, ToolPayload};

    #[test]
    fn weather_hint_is_cleaned_to_city() {
        let args = map_hint_to_args("get_weather", "Seoul weather?").expect("args");
        assert_eq!(args["location"], json!("Seoul"));
    }

    #[test]
    fn prose_command_hint_is_rejected() {
        assert!(!is_plausible_command("Check if uv is installed"));
        assert!(!is_plausible_command("uv 버전 확인"));
        assert!(is_plausible_command("uv --version"));
        // Two words starting with a verb can still be a real command.
        assert!(is_plausible_command("Test -f"));
    }

    #[test]
    fn rejected_hint_falls_back_to_keyword_inference() {
        assert!(map_hint_to_args("execute_command", "Check if uv is installed").is_none());
        let (tool, args) =
            infer_tool_call("Check if uv is installed and python version", "execute_command")
                .expect("inference");
        assert_eq!(tool, "execute_command");
        assert_eq!(args["command"], json!("uv --version && python --version"));
    }

    #[test]
    fn version_synthesis_for_single_target() {
        assert_eq!(synthesize_command("uv version?"), "uv --version");
        assert_eq!(synthesize_command("python 버전 확인"), "python --version");
        assert_eq!(synthesize_command("git version please"), "git --version");
    }

    #[test]
    fn weather_inference_defaults_to_seoul() {
        let (tool, args) = infer_tool_call("weather today?", "get_weather").expect("inference");
        assert_eq!(tool, "get_weather");
        assert_eq!(args["location"], json!("Seoul"));
    }

    #[test]
    fn foreign_keys_are_renamed() {
        let mut args = Map::new();
        args.insert("location".to_string(), json!("rust async"));
        let fixed = repair_argument_keys("search_web", args);
        assert_eq!(fixed["query"], json!("rust async"));
        assert!(!fixed.contains_key("location"));

        let mut args = Map::new();
        args.insert("query".to_string(), json!("Seoul"));
        let fixed = repair_argument_keys("get_weather", args);
        assert_eq!(fixed["location"], json!("Seoul"));
    }

    #[test]
    fn semantic_markers_flip_success_to_failure() {
        let outcome = ToolOutcome::Success {
            tool: "search_web".to_string(),
            arguments: Map::new(),
            payload: ToolPayload::Search {
                query: "x".to_string(),
                results: vec![crate::tools::executor::SearchItem {
                    title: "Rate limit exceeded".to_string(),
                    url: "https://a".to_string(),
                    snippet: "".to_string(),
                }],
            },
        };
        let checked = super::apply_semantic_check(outcome);
        assert!(!checked.succeeded());
        assert!(checked.error().unwrap().contains("rate limit"));
    }

    #[test]
    fn plain_error_word_does_not_trigger_semantic_failure() {
        let outcome = ToolOutcome::Success {
            tool: "search_web".to_string(),
            arguments: Map::new(),
            payload: ToolPayload::Search {
                query: "x".to_string(),
                results: vec![crate::tools::executor::SearchItem {
                    title: "Common error handling patterns".to_string(),
                    url: "https://a".to_string(),
                    snippet: "".to_string(),
                }],
            },
        };
        assert!(super::apply_semantic_check(outcome).succeeded());
    }

    #[test]
    fn failed_command_payload_is_a_failure() {
        let outcome = ToolOutcome::Success {
            tool: "execute_command".to_string(),
            arguments: Map::new(),
            payload: ToolPayload::Command(CommandOutput {
                command: "nope".to_string(),
                stdout: String::new(),
                stderr: "nope: command not found".to_string(),
                return_code: 127,
                success: false,
            }),
        };
        let checked = super::apply_semantic_check(outcome);
        assert!(!checked.succeeded());
    }

    #[test]
    fn bare_string_repair_becomes_command() {
        let args = parse_repair_output("execute_command", "python --version").expect("args");
        assert_eq!(args["command"], json!("python --version"));
        assert!(parse_repair_output("get_weather", "Seoul").is_none());
    }

    #[test]
    fn json_repair_output_is_parsed() {
        let args =
            parse_repair_output("get_weather", "```json\n{\"location\": \"Busan\"}\n```").expect("args");
        assert_eq!(args["location"], json!("Busan"));
    }
}
