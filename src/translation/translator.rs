use std::time::Duration;

use serde_json::Value;

const TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over the public Google Translate web endpoint. Every failure
/// degrades to the input text — translation is best-effort by contract.
#[derive(Clone)]
pub struct HttpTranslator {
    http: reqwest::Client,
}

impl HttpTranslator {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn translate(&self, text: &str, src: &str, dest: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        match self.request(text, src, dest).await {
            Some(translated) if !translated.trim().is_empty() => translated,
            _ => {
                tracing::warn!(src, dest, "translation failed, keeping original text");
                text.to_string()
            }
        }
    }

    async fn request(&self, text: &str, src: &str, dest: &str) -> Option<String> {
        let response = self
            .http
            .get(TRANSLATE_URL)
            .query(&[
                ("client", "gtx"),
                ("sl", src),
                ("tl", dest),
                ("dt", "t"),
                ("q", text),
            ])
            .timeout(TRANSLATE_TIMEOUT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let doc: Value = response.json().await.ok()?;
        Some(join_segments(&doc))
    }
}

/// The endpoint answers a nested array; element 0 holds `[translated, original, …]`
/// segment pairs.
fn join_segments(doc: &Value) -> String {
    let mut out = String::new();
    if let Some(segments) = doc.get(0).and_then(|v| v.as_array()) {
        for part in segments {
            if let Some(piece) = part.get(0).and_then(|v| v.as_str()) {
                out.push_str(piece);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::join_segments;

    #[test]
    fn joins_nested_segments() {
        let doc = json!([[["Hello ", "안녕 ", null], ["world", "세상", null]], null, "ko"]);
        assert_eq!(join_segments(&doc), "Hello world");
    }

    #[test]
    fn empty_document_yields_empty() {
        assert_eq!(join_segments(&json!(null)), "");
    }
}
