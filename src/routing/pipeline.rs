use std::sync::LazyLock;

use regex::Regex;

use crate::routing::Router;
use crate::types::{PipelineStep, RouteDecision};

/// Whether a compound pattern also implies attached-document context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Plain,
    WithRag,
}

/// Compound request patterns: a tool step whose output feeds a follow-up
/// model step. Korean forms first (they survive a failed translation), then
/// the English-internal forms.
const PATTERNS: &[(&str, &str, Variant)] = &[
    (r"검색.{0,5}(요약|정리|설명|번역)", "search_web", Variant::Plain),
    (r"찾아.{0,5}(요약|정리|설명|번역)", "search_web", Variant::Plain),
    (r"날씨.{0,10}(판단|추천|필요)", "get_weather", Variant::Plain),
    (r"뉴스.{0,5}(요약|정리|브리핑)", "search_news", Variant::Plain),
    (r"(?:버전|version).{0,10}설명", "search_web", Variant::Plain),
    (r"(?:요약|정리).{0,15}날씨.{0,5}(?:알려|확인)", "get_weather", Variant::WithRag),
    (r"search.{0,30}(summariz\w*|explain|translate)", "search_web", Variant::Plain),
    (r"find .{0,30}(summariz\w*|explain|translate)", "search_web", Variant::Plain),
    (r"weather.{0,30}(need|should|recommend)", "get_weather", Variant::Plain),
    (r"news.{0,20}(summariz\w*|brief\w*)", "search_news", Variant::Plain),
    (r"summariz\w*.{0,40}weather", "get_weather", Variant::WithRag),
];

static COMPILED: LazyLock<Vec<(Regex, &'static str, Variant)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(pat, tool, variant)| {
            (Regex::new(pat).expect("pipeline pattern"), *tool, *variant)
        })
        .collect()
});

#[derive(Debug, Clone)]
pub struct CompoundMatch {
    pub tool_hint: &'static str,
    pub follow_up: String,
    pub variant: Variant,
}

/// The canonical unit the orchestrator executes.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub steps: Vec<PipelineStep>,
    pub rag_variant: bool,
}

impl Pipeline {
    pub fn is_multi_step(&self) -> bool {
        self.steps.len() > 1
    }
}

/// Scans the input against the compound pattern table. Pure and synchronous
/// so it stays cheap to probe before any model work.
pub fn match_compound(input: &str) -> Option<CompoundMatch> {
    let lower = input.to_lowercase();
    for (re, tool, variant) in COMPILED.iter() {
        if let Some(caps) = re.captures(&lower) {
            let follow_up = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "process".to_string());
            return Some(CompoundMatch {
                tool_hint: tool,
                follow_up,
                variant: *variant,
            });
        }
    }
    None
}

/// Builds the canonical pipeline: a matched compound pattern becomes the
/// two-step tool→model chain, anything else wraps the Router's verdict.
pub async fn build_pipeline(router: &Router, input: &str) -> Pipeline {
    if let Some(compound) = match_compound(input) {
        let steps = vec![
            PipelineStep::first(
                RouteDecision::tool(compound.tool_hint, Some(input.to_string()))
                    .with_description(format!("compound: {}", compound.follow_up)),
                format!("run {}", compound.tool_hint),
            ),
            PipelineStep::chained(
                2,
                RouteDecision::direct(),
                1,
                format!("{} the result", compound.follow_up),
            ),
        ];
        return Pipeline {
            steps,
            rag_variant: compound.variant == Variant::WithRag,
        };
    }

    let decision = router.route(input).await;
    Pipeline {
        steps: vec![PipelineStep::first(decision, "single step")],
        rag_variant: false,
    }
}

#[cfg(test)]
mod tests {
    use super::{Variant, match_compound};

    #[test]
    fn search_then_summarize_matches() {
        let m = match_compound("search for rust async runtimes then summarize them").expect("match");
        assert_eq!(m.tool_hint, "search_web");
        assert_eq!(m.variant, Variant::Plain);
    }

    #[test]
    fn news_briefing_matches_news_tool() {
        let m = match_compound("grab today's news and brief me").expect("match");
        assert_eq!(m.tool_hint, "search_news");
    }

    #[test]
    fn summarize_plus_weather_is_rag_variant() {
        let m = match_compound("summarize this document and check the weather").expect("match");
        assert_eq!(m.tool_hint, "get_weather");
        assert_eq!(m.variant, Variant::WithRag);
    }

    #[test]
    fn plain_request_does_not_match() {
        assert!(match_compound("Seoul weather?").is_none());
    }

    #[test]
    fn weather_recommendation_chain_matches() {
        let m = match_compound("check the weather and tell me if I should bring an umbrella")
            .expect("match");
        assert_eq!(m.tool_hint, "get_weather");
    }
}
