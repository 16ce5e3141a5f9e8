use std::sync::LazyLock;

use regex::Regex;

use crate::translation::detector::detect_language;
use crate::translation::translator::HttpTranslator;

/// Captures what `to_english` learned about the input so the reply can be
/// steered back into the user's language.
#[derive(Debug, Clone)]
pub struct TranslationContext {
    pub original_text: String,
    pub original_lang: String,
    pub english_text: String,
    pub was_translated: bool,
}

impl TranslationContext {
    fn passthrough(text: &str, lang: &str) -> Self {
        Self {
            original_text: text.to_string(),
            original_lang: lang.to_string(),
            english_text: text.to_string(),
            was_translated: false,
        }
    }
}

/// Makes the core English-internal: multilingual input → English, model
/// output → the user's language. Fenced code blocks survive verbatim.
#[derive(Clone)]
pub struct TranslationPipeline {
    translator: HttpTranslator,
    enabled: bool,
}

impl TranslationPipeline {
    pub fn new(http: reqwest::Client, enabled: bool) -> Self {
        Self {
            translator: HttpTranslator::new(http),
            enabled,
        }
    }

    pub async fn to_english(&self, text: &str) -> TranslationContext {
        if !self.enabled || text.trim().is_empty() {
            return TranslationContext::passthrough(text, "en");
        }
        let lang = detect_language(text);
        if lang == "en" {
            return TranslationContext::passthrough(text, "en");
        }

        let english = self.translator.translate(text, &lang, "en").await;
        let was_translated = english != text;
        if was_translated {
            tracing::info!(from = %lang, "translated input to English");
        }
        TranslationContext {
            original_text: text.to_string(),
            original_lang: lang,
            english_text: english,
            was_translated,
        }
    }

    pub async fn from_english(&self, english_response: &str, ctx: &TranslationContext) -> String {
        if !self.enabled
            || !ctx.was_translated
            || ctx.original_lang == "en"
            || english_response.trim().is_empty()
        {
            return english_response.to_string();
        }

        // Code fences hold filenames, commands, stdout — never translate them.
        let (masked, blocks) = mask_code_blocks(english_response);
        let translated = if masked.trim().is_empty() {
            masked
        } else {
            self.translator
                .translate(&masked, "en", &ctx.original_lang)
                .await
        };
        restore_code_blocks(&translated, &blocks)
    }
}

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("code-block regex"));

/// Swaps every fenced block for a `__CODE_BLOCK_i__` placeholder.
pub fn mask_code_blocks(text: &str) -> (String, Vec<(String, String)>) {
    let mut masked = text.to_string();
    let mut blocks = Vec::new();
    for (i, m) in CODE_BLOCK.find_iter(text).enumerate() {
        let placeholder = format!("__CODE_BLOCK_{i}__");
        masked = masked.replacen(m.as_str(), &placeholder, 1);
        blocks.push((placeholder, m.as_str().to_string()));
    }
    (masked, blocks)
}

/// Puts the original fenced blocks back, byte-identical.
pub fn restore_code_blocks(text: &str, blocks: &[(String, String)]) -> String {
    let mut out = text.to_string();
    for (placeholder, block) in blocks {
        out = out.replacen(placeholder.as_str(), block, 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{mask_code_blocks, restore_code_blocks};

    #[test]
    fn code_blocks_round_trip_byte_identical() {
        let text = "Run this:\n```bash\nuv --version && python --version\n```\nthen report.";
        let (masked, blocks) = mask_code_blocks(text);
        assert!(masked.contains("__CODE_BLOCK_0__"));
        assert!(!masked.contains("uv --version"));
        assert_eq!(restore_code_blocks(&masked, &blocks), text);
    }

    #[test]
    fn multiple_blocks_keep_order() {
        let text = "```a```mid```b```";
        let (masked, blocks) = mask_code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(restore_code_blocks(&masked, &blocks), text);
    }

    #[test]
    fn no_blocks_is_identity() {
        let (masked, blocks) = mask_code_blocks("plain text");
        assert_eq!(masked, "plain text");
        assert!(blocks.is_empty());
    }
}
