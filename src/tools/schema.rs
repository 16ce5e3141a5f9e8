use serde_json::{Map, Value};

// ── Tool registry ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "get_weather",
        description: "Get current weather information for a specific location",
        params: &[
            ParamSpec {
                name: "location",
                kind: "string",
                description: "City name (e.g., 'Seoul', 'Tokyo', 'New York')",
                required: true,
            },
            ParamSpec {
                name: "unit",
                kind: "string",
                description: "Temperature unit: celsius or fahrenheit (default: celsius)",
                required: false,
            },
        ],
    },
    ToolSpec {
        name: "search_web",
        description: "Search the web for current information on any topic",
        params: &[
            ParamSpec {
                name: "query",
                kind: "string",
                description: "Search query",
                required: true,
            },
            ParamSpec {
                name: "num_results",
                kind: "integer",
                description: "Number of results to return (default: 5, max: 10)",
                required: false,
            },
        ],
    },
    ToolSpec {
        name: "search_news",
        description: "Search recent news articles",
        params: &[
            ParamSpec {
                name: "query",
                kind: "string",
                description: "News search query",
                required: true,
            },
            ParamSpec {
                name: "num_results",
                kind: "integer",
                description: "Number of results (default: 5, max: 10)",
                required: false,
            },
        ],
    },
    ToolSpec {
        name: "search_wikipedia",
        description: "Get a Wikipedia article summary for a topic",
        params: &[
            ParamSpec {
                name: "query",
                kind: "string",
                description: "Topic to search on Wikipedia",
                required: true,
            },
            ParamSpec {
                name: "lang",
                kind: "string",
                description: "Language code (en, ko, ja, ... Default: en)",
                required: false,
            },
        ],
    },
    ToolSpec {
        name: "read_url",
        description: "Read and extract text content from a URL",
        params: &[
            ParamSpec {
                name: "url",
                kind: "string",
                description: "URL to read content from",
                required: true,
            },
            ParamSpec {
                name: "max_chars",
                kind: "integer",
                description: "Maximum characters to return (default: 2000)",
                required: false,
            },
        ],
    },
    ToolSpec {
        name: "calculate",
        description: "Perform mathematical calculations",
        params: &[ParamSpec {
            name: "expression",
            kind: "string",
            description: "Arithmetic expression to evaluate (e.g., '2 + 2 * 3')",
            required: true,
        }],
    },
    ToolSpec {
        name: "get_current_time",
        description: "Get current date and time for a timezone",
        params: &[ParamSpec {
            name: "timezone",
            kind: "string",
            description: "Timezone name (e.g., 'Asia/Seoul', 'UTC', 'America/New_York')",
            required: false,
        }],
    },
    ToolSpec {
        name: "execute_command",
        description: "Execute a terminal/shell command. Use for running tools, checking versions, listing files.",
        params: &[
            ParamSpec {
                name: "command",
                kind: "string",
                description: "Command to execute (e.g., 'python --version', 'ls')",
                required: true,
            },
            ParamSpec {
                name: "timeout",
                kind: "integer",
                description: "Timeout in seconds (default: 30)",
                required: false,
            },
        ],
    },
];

pub fn get_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name == name)
}

/// The primary required parameter a bare string argument maps onto.
pub fn canonical_param(tool: &str) -> Option<&'static str> {
    get_tool(tool)?.params.iter().find(|p| p.required).map(|p| p.name)
}

/// Tool list rendered for constrained-generation prompts.
pub fn tools_prompt() -> String {
    let mut out = Vec::with_capacity(TOOLS.len());
    for tool in TOOLS {
        let mut lines = vec![format!("- {}: {}", tool.name, tool.description)];
        for p in tool.params {
            let mark = if p.required { "*" } else { "" };
            lines.push(format!("  - {}{} ({}): {}", p.name, mark, p.kind, p.description));
        }
        out.push(lines.join("\n"));
    }
    out.join("\n")
}

/// Checks required parameters. The executor separately drops undeclared keys
/// so handlers only ever see schema-exact argument sets.
pub fn validate_call(name: &str, arguments: &Map<String, Value>) -> Result<(), String> {
    let Some(tool) = get_tool(name) else {
        return Err(format!("Unknown tool: {name}"));
    };
    for p in tool.params.iter().filter(|p| p.required) {
        if !arguments.contains_key(p.name) {
            return Err(format!("Missing required parameter: {}", p.name));
        }
    }
    Ok(())
}

/// Strips keys the schema doesn't declare (the `retry` sentinel included).
pub fn strip_foreign_keys(name: &str, arguments: &Map<String, Value>) -> Map<String, Value> {
    let Some(tool) = get_tool(name) else {
        return arguments.clone();
    };
    arguments
        .iter()
        .filter(|(k, _)| tool.params.iter().any(|p| p.name == k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::{canonical_param, strip_foreign_keys, validate_call};

    fn args(pairs: &[(&str, serde_json::Value)]) -> Map<String, serde_json::Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn missing_required_is_rejected() {
        assert!(validate_call("get_weather", &Map::new()).is_err());
        assert!(validate_call("get_weather", &args(&[("location", json!("Seoul"))])).is_ok());
    }

    #[test]
    fn unknown_tool_is_rejected() {
        assert!(validate_call("launch_rocket", &Map::new()).is_err());
    }

    #[test]
    fn canonical_params() {
        assert_eq!(canonical_param("search_web"), Some("query"));
        assert_eq!(canonical_param("get_weather"), Some("location"));
        assert_eq!(canonical_param("execute_command"), Some("command"));
        assert_eq!(canonical_param("get_current_time"), None);
    }

    #[test]
    fn foreign_keys_are_stripped() {
        let a = args(&[("location", json!("Seoul")), ("retry", json!(true))]);
        let cleaned = strip_foreign_keys("get_weather", &a);
        assert!(cleaned.contains_key("location"));
        assert!(!cleaned.contains_key("retry"));
    }
}
