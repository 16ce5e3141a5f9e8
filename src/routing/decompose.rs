use std::sync::LazyLock;

use regex::Regex;

/// Shared topic a decomposed query carries into each sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Weather,
    News,
    Stock,
    Time,
    Calculation,
    None,
}

static SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:, | and | or | vs | & | as well as )\s*").expect("split regex")
});

static CALC_EXPR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\s*[+*/-]\s*\d").expect("calc regex"));

/// Functional words dropped when extracting entities from a fragment.
const STOPWORDS: &[&str] = &[
    "tell", "me", "show", "find", "search", "check", "get", "know", "want", "please", "can",
    "could", "would", "results", "based", "on", "articles", "about", "of", "for", "in", "to",
    "with", "by", "from", "the", "a", "an", "is", "are", "how", "what", "generated", "identified",
    "found", "mentioned", "using", "explain", "explanation", "which", "recent", "latest",
    "current", "news", "information", "info", "data", "status", "difference", "compare",
    "comparison", "versus",
];

const COMPARISON_WORDS: &[&str] = &[
    "compare", "difference", "vs", "versus", "비교", "차이",
];

const ACTION_WORDS: &[&str] = &["report", "write", "summary", "summarize", "organize", "정리"];

/// Entities that are only the topic word itself carry no information.
const NEWS_NOISE: &[&str] = &["news", "report", "latest", "recent"];

/// True when the text carries an explicit comparison word.
pub fn has_comparison(text: &str) -> bool {
    let lower = text.to_lowercase();
    COMPARISON_WORDS.iter().any(|k| lower.contains(k))
}

/// True when the text joins entities with a coordinator ("A and B", "A, B").
pub fn has_coordinator(text: &str) -> bool {
    SPLIT_RE.is_match(text)
}

pub fn detect_topic(text: &str) -> Topic {
    let lower = text.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));
    if has(&["weather", "날씨", "기온"]) {
        Topic::Weather
    } else if has(&["news", "뉴스", "소식", "기사"]) {
        Topic::News
    } else if has(&["stock", "주가", "주식"]) {
        Topic::Stock
    } else if has(&["what time", "time in", "시간", "몇시"]) {
        Topic::Time
    } else if has(&["calculate", "계산"]) || CALC_EXPR.is_match(&lower) {
        Topic::Calculation
    } else {
        Topic::None
    }
}

/// Splits a coordinated or comparative query into independent sub-queries,
/// each re-anchored to the shared topic (`"Seoul weather"`, `"Tokyo weather"`).
/// Never returns an empty list.
pub fn decompose(english: &str) -> Vec<String> {
    let topic = detect_topic(english);
    let lower = english.to_lowercase();

    let mut entities: Vec<String> = Vec::new();
    for part in SPLIT_RE.split(english) {
        let clean = part.trim().trim_matches(|c: char| "?.!,".contains(c)).trim();
        if clean.is_empty() {
            continue;
        }
        if let Some(entity) = extract_entity(clean, topic) {
            entities.push(entity);
        }
    }

    // Topic suffix makes each entity a self-contained query.
    entities = entities
        .into_iter()
        .filter_map(|e| attach_topic(e, topic))
        .collect();

    // Action words describe the report step, not a lookup target.
    entities.retain(|e| !ACTION_WORDS.contains(&e.to_lowercase().as_str()));

    let is_comparison = COMPARISON_WORDS.iter().any(|k| lower.contains(k));
    if is_comparison && entities.len() >= 2 && !entities.iter().any(|e| e == "Compare results") {
        entities.push("Compare results".to_string());
    }

    if entities.is_empty() {
        entities.push(english.trim().to_string());
    }
    tracing::debug!(?entities, "decomposition result");
    entities
}

/// Keeps the content words of a fragment: everything outside the functional
/// stopword set and the topic's own keywords. Numerics survive when the
/// topic is a calculation.
fn extract_entity(fragment: &str, topic: Topic) -> Option<String> {
    let kept: Vec<&str> = fragment
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && !"+-*/.".contains(c)))
        .filter(|t| !t.is_empty())
        .filter(|t| {
            let lower = t.to_lowercase();
            if topic == Topic::Calculation && t.chars().any(|c| c.is_ascii_digit()) {
                return true;
            }
            if is_topic_word(&lower, topic) {
                return false;
            }
            !STOPWORDS.contains(&lower.as_str())
        })
        .collect();

    let entity = kept.join(" ");
    (entity.len() >= 2).then_some(entity)
}

fn is_topic_word(word: &str, topic: Topic) -> bool {
    match topic {
        Topic::Weather => matches!(word, "weather" | "날씨" | "기온"),
        Topic::News => matches!(word, "news" | "뉴스" | "소식" | "기사"),
        Topic::Stock => matches!(word, "stock" | "stocks" | "주가" | "주식" | "price"),
        Topic::Time => matches!(word, "time" | "시간" | "몇시"),
        Topic::Calculation | Topic::None => false,
    }
}

fn attach_topic(entity: String, topic: Topic) -> Option<String> {
    match topic {
        Topic::Weather => Some(format!("{entity} weather")),
        Topic::News => {
            if NEWS_NOISE.contains(&entity.to_lowercase().as_str()) {
                None
            } else {
                Some(format!("{entity} latest news"))
            }
        }
        Topic::Stock => Some(format!("{entity} stock price")),
        Topic::Time => Some(format!("{entity} local time")),
        Topic::Calculation | Topic::None => Some(entity),
    }
}

#[cfg(test)]
mod tests {
    use super::{Topic, decompose, detect_topic};

    #[test]
    fn coordinated_weather_query_splits_with_topic() {
        assert_eq!(decompose("Seoul and Tokyo weather"), vec!["Seoul weather", "Tokyo weather"]);
    }

    #[test]
    fn comparison_appends_compare_marker() {
        assert_eq!(
            decompose("Compare React, Vue, Angular"),
            vec!["React", "Vue", "Angular", "Compare results"]
        );
    }

    #[test]
    fn simple_query_stays_singleton() {
        let out = decompose("Seoul weather");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn news_entities_get_news_suffix() {
        let out = decompose("Anthropic and OpenAI latest news");
        assert_eq!(out, vec!["Anthropic latest news", "OpenAI latest news"]);
    }

    #[test]
    fn never_empty() {
        assert_eq!(decompose("and"), vec!["and"]);
    }

    #[test]
    fn topic_detection() {
        assert_eq!(detect_topic("Seoul weather please"), Topic::Weather);
        assert_eq!(detect_topic("latest ai news"), Topic::News);
        assert_eq!(detect_topic("calculate 3 + 4"), Topic::Calculation);
    }
}
