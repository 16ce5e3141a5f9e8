use std::sync::LazyLock;

use regex::Regex;
use whatlang::Lang;

static KANA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{3040}-\u{309F}\u{30A0}-\u{30FF}]").expect("kana regex"));
static HANGUL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\u{AC00}-\u{D7AF}\u{1100}-\u{11FF}\u{3130}-\u{318F}]").expect("hangul regex")
});
static HAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{4E00}-\u{9FFF}]").expect("han regex"));
static CYRILLIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{0400}-\u{04FF}]").expect("cyrillic regex"));
static ARABIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{0600}-\u{06FF}]").expect("arabic regex"));
static THAI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{0E00}-\u{0E7F}]").expect("thai regex"));

/// Detects the language of `text` as an ISO 639-1 code. Probabilistic
/// classification first, Unicode-range counting as the fallback.
pub fn detect_language(text: &str) -> String {
    if text.trim().is_empty() {
        return "en".to_string();
    }

    // Kana is unambiguous; it also rescues Japanese text that a classifier
    // would call Chinese via the shared Han range.
    if KANA.is_match(text) {
        return "ja".to_string();
    }

    if let Some(info) = whatlang::detect(text)
        && info.is_reliable()
        && let Some(code) = iso_code(info.lang())
    {
        return code.to_string();
    }

    detect_by_unicode(text).to_string()
}

fn iso_code(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Kor => "ko",
        Lang::Jpn => "ja",
        Lang::Cmn => "zh",
        Lang::Rus => "ru",
        Lang::Ara => "ar",
        Lang::Tha => "th",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Vie => "vi",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        Lang::Pol => "pl",
        Lang::Tur => "tr",
        Lang::Hin => "hi",
        Lang::Ind => "id",
        Lang::Ukr => "uk",
        _ => return None,
    };
    Some(code)
}

/// Counts hits per script range and picks the densest one.
fn detect_by_unicode(text: &str) -> &'static str {
    let counts = [
        ("ko", HANGUL.find_iter(text).count()),
        ("zh", HAN.find_iter(text).count()),
        ("ru", CYRILLIC.find_iter(text).count()),
        ("ar", ARABIC.find_iter(text).count()),
        ("th", THAI.find_iter(text).count()),
    ];
    counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(code, _)| *code)
        .unwrap_or("en")
}

#[cfg(test)]
mod tests {
    use super::detect_language;

    #[test]
    fn korean_detected() {
        assert_eq!(detect_language("안녕하세요, 오늘 날씨가 좋네요."), "ko");
    }

    #[test]
    fn japanese_beats_chinese_when_kana_present() {
        // Han characters plus hiragana must classify as Japanese.
        assert_eq!(detect_language("今日は天気がいいですね"), "ja");
    }

    #[test]
    fn pure_han_is_chinese() {
        assert_eq!(detect_language("今天天气很好"), "zh");
    }

    #[test]
    fn english_default() {
        assert_eq!(detect_language("Hello, how are you?"), "en");
        assert_eq!(detect_language("   "), "en");
    }

    #[test]
    fn cyrillic_detected() {
        assert_eq!(detect_language("Привет, как дела?"), "ru");
    }
}
