use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tools::safety;
use crate::tools::schema::{strip_foreign_keys, validate_call};

const WEATHER_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const WIKI_TIMEOUT: Duration = Duration::from_secs(10);
const URL_TIMEOUT: Duration = Duration::from_secs(15);
const WEATHER_RETRIES: u32 = 5;
const DEFAULT_COMMAND_TIMEOUT: u64 = 30;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Domains dropped from search results; extra results are fetched to backfill.
const BLOCKED_DOMAINS: &[&str] = &[
    "zhihu.com", "baidu.com", "163.com", "sohu.com", "weibo.com", "csdn.net", "bilibili.com",
];

/// Korean city names → wttr.in-friendly English names.
pub(crate) const CITY_MAP: &[(&str, &str)] = &[
    ("서울", "Seoul"),
    ("도쿄", "Tokyo"),
    ("런던", "London"),
    ("광주", "Gwangju"),
    ("부산", "Busan"),
    ("인천", "Incheon"),
    ("대구", "Daegu"),
    ("대전", "Daejeon"),
    ("파리", "Paris"),
    ("뉴욕", "New York"),
    ("베이징", "Beijing"),
    ("제주", "Jeju"),
    ("청주", "Cheongju"),
    ("울산", "Ulsan"),
    ("수원", "Suwon"),
];

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature: String,
    pub condition: String,
    pub humidity: String,
    pub feels_like: String,
    pub wind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub date: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WikiSummary {
    pub title: String,
    pub extract: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageContent {
    pub url: String,
    pub content: String,
    pub total_length: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcResult {
    pub expression: String,
    pub result: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeReport {
    pub timezone: String,
    pub datetime: String,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub success: bool,
}

/// Discriminated union of every tool's structured result. Downstream code
/// (formatter, workers) renders from these fields, never from ad-hoc maps.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Weather(WeatherReport),
    Search {
        query: String,
        results: Vec<SearchItem>,
    },
    News {
        query: String,
        results: Vec<NewsItem>,
    },
    Wiki(WikiSummary),
    Page(PageContent),
    Calc(CalcResult),
    Time(TimeReport),
    Command(CommandOutput),
}

impl ToolPayload {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),
    #[error("{0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Blocked(String),
    #[error("Command timed out after {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Execution(String),
}

/// Terminal result of one tool invocation.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Success {
        tool: String,
        arguments: Map<String, Value>,
        payload: ToolPayload,
    },
    Failure {
        tool: String,
        arguments: Map<String, Value>,
        error: String,
    },
}

impl ToolOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    pub fn tool(&self) -> &str {
        match self {
            ToolOutcome::Success { tool, .. } | ToolOutcome::Failure { tool, .. } => tool,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolOutcome::Failure { error, .. } => Some(error),
            ToolOutcome::Success { .. } => None,
        }
    }

    /// Wire shape consumed by the formatter's unwrap step.
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutcome::Success {
                tool,
                arguments,
                payload,
            } => serde_json::json!({
                "success": true,
                "tool": tool,
                "arguments": arguments,
                "result": payload.to_value(),
            }),
            ToolOutcome::Failure {
                tool,
                arguments,
                error,
            } => serde_json::json!({
                "success": false,
                "tool": tool,
                "arguments": arguments,
                "error": error,
            }),
        }
    }
}

// ── Invocation seam ───────────────────────────────────────────────────────────

/// Seam between the dispatcher and the concrete handlers (stubbed in tests).
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutcome;
}

/// Executes registered tools. Handlers are pure I/O and never touch the
/// model lock, so they are free to run fully in parallel.
pub struct ToolExecutor {
    http: reqwest::Client,
}

impl ToolExecutor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn run(&self, name: &str, args: &Map<String, Value>) -> Result<ToolPayload, ToolError> {
        let str_arg = |key: &str| args.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let int_arg = |key: &str| args.get(key).and_then(|v| v.as_i64());

        match name {
            "get_weather" => {
                let location = str_arg("location")
                    .ok_or_else(|| ToolError::InvalidArguments("location must be a string".into()))?;
                let unit = str_arg("unit").unwrap_or_else(|| "celsius".to_string());
                self.get_weather(&location, &unit).await
            }
            "search_web" => {
                let query = str_arg("query")
                    .ok_or_else(|| ToolError::InvalidArguments("query must be a string".into()))?;
                let n = int_arg("num_results").unwrap_or(5).clamp(1, 10) as usize;
                self.search_web(&query, n).await
            }
            "search_news" => {
                let query = str_arg("query")
                    .ok_or_else(|| ToolError::InvalidArguments("query must be a string".into()))?;
                let n = int_arg("num_results").unwrap_or(5).clamp(1, 10) as usize;
                self.search_news(&query, n).await
            }
            "search_wikipedia" => {
                let query = str_arg("query")
                    .ok_or_else(|| ToolError::InvalidArguments("query must be a string".into()))?;
                let lang = str_arg("lang").unwrap_or_else(|| "en".to_string());
                self.search_wikipedia(&query, &lang).await
            }
            "read_url" => {
                let url = str_arg("url")
                    .ok_or_else(|| ToolError::InvalidArguments("url must be a string".into()))?;
                let max_chars = int_arg("max_chars").unwrap_or(2000).max(1) as usize;
                self.read_url(&url, max_chars).await
            }
            "calculate" => {
                let expr = str_arg("expression").ok_or_else(|| {
                    ToolError::InvalidArguments("expression must be a string".into())
                })?;
                calculate(&expr)
            }
            "get_current_time" => {
                let tz = str_arg("timezone").unwrap_or_else(|| "UTC".to_string());
                Ok(current_time(&tz))
            }
            "execute_command" => {
                let command = str_arg("command")
                    .ok_or_else(|| ToolError::InvalidArguments("command must be a string".into()))?;
                let timeout = int_arg("timeout").unwrap_or(DEFAULT_COMMAND_TIMEOUT as i64).max(1) as u64;
                execute_command(&command, timeout).await
            }
            other => Err(ToolError::Unknown(other.to_string())),
        }
    }

    // ── get_weather ───────────────────────────────────────────────────────────

    async fn get_weather(&self, location: &str, unit: &str) -> Result<ToolPayload, ToolError> {
        let city = normalize_city(location);
        let url = format!("https://wttr.in/{}?format=j1", percent_encode(&city));

        let mut last_err = String::new();
        for attempt in 1..=WEATHER_RETRIES {
            match self.fetch_weather(&url, location, unit).await {
                Ok(report) => return Ok(ToolPayload::Weather(report)),
                Err(e) => {
                    last_err = e;
                    if attempt < WEATHER_RETRIES {
                        // Linear backoff; wttr.in rate-limits aggressively.
                        tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
                    }
                }
            }
        }
        Err(ToolError::Execution(format!(
            "Could not find weather for '{location}'. Try a plain city name (e.g. 'Seoul'). Debug: {last_err}"
        )))
    }

    async fn fetch_weather(
        &self,
        url: &str,
        location: &str,
        unit: &str,
    ) -> Result<WeatherReport, String> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", BROWSER_UA)
            .timeout(WEATHER_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("wttr.in returned {}", response.status()));
        }
        let doc: Value = response.json().await.map_err(|e| e.to_string())?;
        let current = doc
            .get("current_condition")
            .and_then(|v| v.get(0))
            .ok_or("missing current_condition")?;
        let field = |key: &str| {
            current
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let (temp, symbol) = if unit == "fahrenheit" {
            (field("temp_F"), "°F")
        } else {
            (field("temp_C"), "°C")
        };
        Ok(WeatherReport {
            location: location.to_string(),
            temperature: format!("{temp}{symbol}"),
            condition: current
                .get("weatherDesc")
                .and_then(|v| v.get(0))
                .and_then(|v| v.get("value"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            humidity: format!("{}%", field("humidity")),
            feels_like: format!("{}°C", field("FeelsLikeC")),
            wind: format!("{} km/h", field("windspeedKmph")),
        })
    }

    // ── search_web / search_news ──────────────────────────────────────────────

    async fn search_web(&self, query: &str, num_results: usize) -> Result<ToolPayload, ToolError> {
        let html = self
            .http
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .header("User-Agent", BROWSER_UA)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?
            .text()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let mut results: Vec<SearchItem> = parse_search_html(&html)
            .into_iter()
            .filter(|item| !is_blocked_domain(&item.url))
            .take(num_results)
            .collect();

        // Empty web results for a news-flavored query: retry via the news
        // endpoint and map into the web shape.
        if results.is_empty() && query.to_lowercase().contains("news") {
            if let Ok(ToolPayload::News { results: news, .. }) =
                self.search_news(query, num_results).await
            {
                results = news
                    .into_iter()
                    .map(|n| SearchItem {
                        title: n.title,
                        url: n.url,
                        snippet: format!("News from {} ({})", n.source, n.date),
                    })
                    .collect();
            }
        }

        Ok(ToolPayload::Search {
            query: query.to_string(),
            results,
        })
    }

    async fn search_news(&self, query: &str, num_results: usize) -> Result<ToolPayload, ToolError> {
        // The news endpoint needs the session token from the landing page.
        let landing = self
            .http
            .get("https://duckduckgo.com/")
            .query(&[("q", query), ("iar", "news"), ("ia", "news")])
            .header("User-Agent", BROWSER_UA)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?
            .text()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let vqd = extract_vqd(&landing)
            .ok_or_else(|| ToolError::Execution("news token not found".to_string()))?;

        let doc: Value = self
            .http
            .get("https://duckduckgo.com/news.js")
            .query(&[("l", "us-en"), ("o", "json"), ("q", query), ("vqd", &vqd)])
            .header("User-Agent", BROWSER_UA)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?
            .json()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let results = doc
            .get("results")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(news_item_from_value)
                    .filter(|item| !is_blocked_domain(&item.url))
                    .take(num_results)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ToolPayload::News {
            query: query.to_string(),
            results,
        })
    }

    // ── search_wikipedia ──────────────────────────────────────────────────────

    async fn search_wikipedia(&self, query: &str, lang: &str) -> Result<ToolPayload, ToolError> {
        let url = format!(
            "https://{lang}.wikipedia.org/api/rest_v1/page/summary/{}",
            percent_encode(query)
        );
        let response = self
            .http
            .get(&url)
            .header("User-Agent", "MoaBot/0.4")
            .timeout(WIKI_TIMEOUT)
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ToolError::Execution(format!("Not found: {query}")));
        }
        let doc: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(ToolPayload::Wiki(WikiSummary {
            title: doc.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            extract: doc.get("extract").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            url: doc
                .get("content_urls")
                .and_then(|v| v.get("desktop"))
                .and_then(|v| v.get("page"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        }))
    }

    // ── read_url ──────────────────────────────────────────────────────────────

    async fn read_url(&self, url: &str, max_chars: usize) -> Result<ToolPayload, ToolError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", "MoaBot/0.4 (Web Reader)")
            .timeout(URL_TIMEOUT)
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ToolError::Execution(format!("HTTP {}", response.status())));
        }
        let html = response
            .text()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let text = html_to_text(&html);
        let total_length = text.chars().count();
        Ok(ToolPayload::Page(PageContent {
            url: url.to_string(),
            content: truncate_chars(&text, max_chars),
            total_length,
            truncated: total_length > max_chars,
        }))
    }
}

#[async_trait]
impl ToolInvoker for ToolExecutor {
    async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutcome {
        if let Err(e) = validate_call(name, arguments) {
            return ToolOutcome::Failure {
                tool: name.to_string(),
                arguments: arguments.clone(),
                error: e,
            };
        }
        // Handlers only ever see schema-declared keys.
        let clean = strip_foreign_keys(name, arguments);
        match self.run(name, &clean).await {
            Ok(payload) => ToolOutcome::Success {
                tool: name.to_string(),
                arguments: arguments.clone(),
                payload,
            },
            Err(e) => ToolOutcome::Failure {
                tool: name.to_string(),
                arguments: arguments.clone(),
                error: e.to_string(),
            },
        }
    }
}

// ── execute_command ───────────────────────────────────────────────────────────

async fn execute_command(command: &str, timeout_secs: u64) -> Result<ToolPayload, ToolError> {
    safety::check_command(command).map_err(ToolError::Blocked)?;

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = tokio::process::Command::new("powershell");
        c.args(["-NoProfile", "-Command", command]);
        c
    } else {
        let mut c = tokio::process::Command::new("bash");
        c.args(["-lc", command]);
        c
    };
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| ToolError::Timeout(timeout_secs))?
        .map_err(|e| ToolError::Execution(e.to_string()))?;

    Ok(ToolPayload::Command(CommandOutput {
        command: command.to_string(),
        stdout: truncate_chars(&String::from_utf8_lossy(&output.stdout), 5_000),
        stderr: truncate_chars(&String::from_utf8_lossy(&output.stderr), 1_000),
        return_code: output.status.code().unwrap_or(-1),
        success: output.status.success(),
    }))
}

// ── calculate ─────────────────────────────────────────────────────────────────

/// Evaluates a basic arithmetic expression. Character set is restricted up
/// front; the tiny recursive-descent parser below does the rest.
pub fn calculate(expression: &str) -> Result<ToolPayload, ToolError> {
    const ALLOWED: &str = "0123456789+-*/.() ";
    if expression.is_empty() || !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(ToolError::InvalidArguments(
            "Invalid characters in expression. Only numbers and basic operators allowed.".into(),
        ));
    }
    let mut parser = ExprParser {
        bytes: expression.as_bytes(),
        pos: 0,
    };
    let value = parser.parse_expr()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(ToolError::InvalidArguments("Malformed expression".into()));
    }
    if !value.is_finite() {
        return Err(ToolError::Execution("Expression result is not finite".into()));
    }
    Ok(ToolPayload::Calc(CalcResult {
        expression: expression.to_string(),
        result: value,
    }))
}

struct ExprParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl ExprParser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn parse_expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.parse_term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.parse_term()?;
            value = if op == b'+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.parse_factor()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            self.pos += 1;
            let rhs = self.parse_factor()?;
            if op == b'/' {
                if rhs == 0.0 {
                    return Err(ToolError::Execution("Division by zero".into()));
                }
                value /= rhs;
            } else {
                value *= rhs;
            }
        }
        Ok(value)
    }

    fn parse_factor(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.parse_factor()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let value = self.parse_expr()?;
                if self.peek() != Some(b')') {
                    return Err(ToolError::InvalidArguments("Unbalanced parentheses".into()));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => {
                let start = self.pos;
                while self
                    .bytes
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_digit() || *b == b'.')
                {
                    self.pos += 1;
                }
                std::str::from_utf8(&self.bytes[start..self.pos])
                    .ok()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| ToolError::InvalidArguments("Malformed number".into()))
            }
            _ => Err(ToolError::InvalidArguments("Malformed expression".into())),
        }
    }
}

// ── get_current_time ──────────────────────────────────────────────────────────

fn current_time(timezone: &str) -> ToolPayload {
    let now = Utc::now();
    if timezone.eq_ignore_ascii_case("utc") {
        return ToolPayload::Time(TimeReport {
            timezone: "UTC".to_string(),
            datetime: now.to_rfc3339(),
            formatted: now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        });
    }
    match timezone.parse::<chrono_tz::Tz>() {
        Ok(tz) => {
            let local = tz.from_utc_datetime(&now.naive_utc());
            ToolPayload::Time(TimeReport {
                timezone: timezone.to_string(),
                datetime: local.to_rfc3339(),
                formatted: local.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
            })
        }
        Err(_) => ToolPayload::Time(TimeReport {
            timezone: format!("UTC (fallback from invalid '{timezone}')"),
            datetime: now.to_rfc3339(),
            formatted: now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }),
    }
}

// ── Location & text helpers ───────────────────────────────────────────────────

/// Reduces free text like "Seoul weather?" or "날씨 서울" to a city name the
/// weather backend accepts.
pub fn normalize_city(location: &str) -> String {
    let mut clean = location
        .to_lowercase()
        .replace("weather", "")
        .replace("날씨", "")
        .trim()
        .trim_matches(|c: char| "?.!,".contains(c))
        .trim()
        .to_string();

    // "how is the weather in Seoul" → "Seoul"
    static IN_CITY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"in\s+([a-zA-Z]+)").expect("in-city regex"));
    if let Some(caps) = IN_CITY.captures(&clean) {
        clean = caps[1].to_string();
    }

    for (korean, english) in CITY_MAP {
        if location.contains(korean) || clean.contains(korean) {
            return (*english).to_string();
        }
        if clean.contains(&english.to_lowercase()) {
            return (*english).to_string();
        }
    }

    // Multi-word leftovers: the city usually trails ("check Seoul").
    if clean.split_whitespace().count() > 1
        && let Some(last) = clean.split_whitespace().last()
    {
        clean = last.to_string();
    }
    if clean.is_empty() {
        return location.to_string();
    }
    title_case(&clean)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_blocked_domain(url: &str) -> bool {
    let lower = url.to_lowercase();
    BLOCKED_DOMAINS.iter().any(|d| lower.contains(d))
}

/// Char-boundary-safe truncation.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)<script[^>]*>.*?</script>").expect("script regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)<style[^>]*>.*?</style>").expect("style regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("ws regex"));

pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    let text = unescape_entities(&text);
    WS_RE.replace_all(&text, " ").trim().to_string()
}

fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
            && let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16)
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(if bytes[i] == b'+' { b' ' } else { bytes[i] });
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ── DuckDuckGo response parsing ───────────────────────────────────────────────

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
        .expect("result-link regex")
});
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#).expect("snippet regex")
});

pub fn parse_search_html(html: &str) -> Vec<SearchItem> {
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| html_to_text(&c[1]))
        .collect();
    RESULT_LINK
        .captures_iter(html)
        .enumerate()
        .map(|(i, caps)| SearchItem {
            title: html_to_text(&caps[2]),
            url: resolve_redirect(&caps[1]),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .filter(|item| !item.url.is_empty())
        .collect()
}

/// DuckDuckGo wraps result links in a redirect carrying the target in `uddg=`.
fn resolve_redirect(href: &str) -> String {
    if let Some(idx) = href.find("uddg=") {
        let tail = &href[idx + 5..];
        let end = tail.find('&').unwrap_or(tail.len());
        return percent_decode(&tail[..end]);
    }
    if let Some(stripped) = href.strip_prefix("//") {
        return format!("https://{stripped}");
    }
    href.to_string()
}

static VQD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"vqd=['"]?([\d-]+)"#).expect("vqd regex"));

fn extract_vqd(html: &str) -> Option<String> {
    VQD_RE.captures(html).map(|c| c[1].to_string())
}

fn news_item_from_value(value: &Value) -> Option<NewsItem> {
    let title = value.get("title")?.as_str()?.to_string();
    let url = value.get("url")?.as_str()?.to_string();
    let date = value
        .get("date")
        .and_then(|v| v.as_i64())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let source = value
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Some(NewsItem {
        title: html_to_text(&title),
        url,
        date,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ToolPayload, calculate, extract_vqd, html_to_text, normalize_city, parse_search_html,
        percent_decode, truncate_chars,
    };

    #[test]
    fn calculator_handles_precedence_and_parens() {
        let ToolPayload::Calc(r) = calculate("2 + 3 * 4").expect("calc") else {
            panic!("expected calc payload");
        };
        assert_eq!(r.result, 14.0);
        let ToolPayload::Calc(r) = calculate("(2 + 3) * 4").expect("calc") else {
            panic!("expected calc payload");
        };
        assert_eq!(r.result, 20.0);
    }

    #[test]
    fn calculator_rejects_foreign_characters() {
        assert!(calculate("import os").is_err());
        assert!(calculate("2 ** 3").is_err());
        assert!(calculate("").is_err());
    }

    #[test]
    fn calculator_rejects_division_by_zero() {
        assert!(calculate("1 / 0").is_err());
    }

    #[test]
    fn calculator_handles_unary_minus() {
        let ToolPayload::Calc(r) = calculate("-3 + 5").expect("calc") else {
            panic!("expected calc payload");
        };
        assert_eq!(r.result, 2.0);
    }

    #[test]
    fn city_normalization() {
        assert_eq!(normalize_city("Seoul weather?"), "Seoul");
        assert_eq!(normalize_city("서울 날씨"), "Seoul");
        assert_eq!(normalize_city("how is the weather in Tokyo"), "Tokyo");
        assert_eq!(normalize_city("check busan"), "Busan");
    }

    #[test]
    fn html_stripping() {
        let html = "<html><script>var x=1;</script><p>Hello &amp; <b>world</b></p></html>";
        assert_eq!(html_to_text(html), "Hello & world");
    }

    #[test]
    fn ddg_redirect_resolution() {
        let html = r##"<a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&amp;rut=abc">Example <b>Title</b></a>
<a class="result__snippet" href="#">A snippet here.</a>"##;
        let items = parse_search_html(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.com/page");
        assert_eq!(items[0].title, "Example Title");
        assert_eq!(items[0].snippet, "A snippet here.");
    }

    #[test]
    fn vqd_extraction() {
        assert_eq!(extract_vqd("x vqd='3-123456-789' y").as_deref(), Some("3-123456-789"));
        assert!(extract_vqd("nothing here").is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("한국어 텍스트", 3), "한국어");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("https%3A%2F%2Fa.b%2Fc+d"), "https://a.b/c d");
    }
}
