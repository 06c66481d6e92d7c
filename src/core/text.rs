use regex::Regex;
use std::sync::LazyLock;

/// Characters of a prefiltered fallback kept when no keyword line matches.
pub const PREFILTER_FALLBACK_CHARS: usize = 800;

static RE_OCR_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 :/.,\-]").expect("valid noise regex"));
static RE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid whitespace regex"));
static RE_TICKET_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(from|to|date|time|valid|validity|class|pass|uts|season|journey|booking)\b",
    )
    .expect("valid keyword regex")
});
static RE_JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid json block regex"));

/// Strips OCR noise: anything outside letters, digits and `:/.,-` becomes a
/// space, runs of spaces collapse, and blank lines are dropped.
pub fn clean_ocr_text(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let replaced = RE_OCR_NOISE.replace_all(line, " ");
            RE_SPACES.replace_all(&replaced, " ").trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keeps only the lines that look like ticket fields, joined by spaces.
///
/// Falls back to the first [`PREFILTER_FALLBACK_CHARS`] characters of the
/// trimmed text when nothing matches.
pub fn prefilter_ocr(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| RE_TICKET_KEYWORDS.is_match(line))
        .collect();

    if kept.is_empty() {
        text.trim().chars().take(PREFILTER_FALLBACK_CHARS).collect()
    } else {
        kept.join(" ")
    }
}

/// Returns the span from the first `{` to the last `}` in a model reply.
pub fn extract_json_block(reply: &str) -> Option<&str> {
    RE_JSON_BLOCK.find(reply).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_ocr_text_removes_noise() {
        let raw = "  FROM: DADAR |~ TO  CST  \n\n\u{2014}\u{2014}\n Date 12/03/2024  ₹10.00 ";
        assert_eq!(
            clean_ocr_text(raw),
            "FROM: DADAR TO CST\nDate 12/03/2024 10.00"
        );
    }

    #[test]
    fn test_clean_ocr_text_keeps_allowed_punctuation() {
        assert_eq!(clean_ocr_text("Time 10:45, Class-II."), "Time 10:45, Class-II.");
        assert_eq!(clean_ocr_text("@@@\n###"), "");
    }

    #[test]
    fn test_prefilter_keeps_keyword_lines() {
        let text = "CENTRAL RAILWAY\nFrom DADAR\nTo THANE\nADULT 1\nJourney Date 12/03/2024\nRs 10";
        assert_eq!(
            prefilter_ocr(text),
            "From DADAR To THANE Journey Date 12/03/2024"
        );
    }

    #[test]
    fn test_prefilter_matches_whole_words_only() {
        // "TODAY" and "CLASSIC" must not count as keywords
        assert_eq!(prefilter_ocr("TODAY\nCLASSIC"), "TODAY\nCLASSIC");
        assert_eq!(prefilter_ocr("uts no X12\nnoise"), "uts no X12");
    }

    #[test]
    fn test_prefilter_fallback_truncates() {
        let text = format!("  {}  ", "A".repeat(1000));
        assert_eq!(prefilter_ocr(&text).len(), PREFILTER_FALLBACK_CHARS);
    }

    #[test]
    fn test_extract_json_block_is_greedy() {
        let reply = "Sure! Here it is:\n{\"origin\": \"Dadar\", \"extra\": {\"a\": 1}}\nThanks";
        assert_eq!(
            extract_json_block(reply),
            Some("{\"origin\": \"Dadar\", \"extra\": {\"a\": 1}}")
        );
        assert_eq!(extract_json_block("no json here"), None);
        assert_eq!(extract_json_block("{\nmultiline\n}"), Some("{\nmultiline\n}"));
    }
}
