//! Text helpers for prompts and model output.

use regex::Regex;
use std::sync::OnceLock;

fn whitespace() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Collapse runs of whitespace (including the hard wraps arXiv puts in titles)
pub fn normalize_whitespace(text: &str) -> String {
    whitespace().replace_all(text.trim(), " ").into_owned()
}

/// Count whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep at most `max_words` words. Overlong text gets a trailing ellipsis.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    let mut truncated = words[..max_words].join(" ");
    truncated.push('…');
    truncated
}

/// Slice to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extract the outermost JSON object from model output.
///
/// Models often wrap JSON in prose or markdown fences; take the span from the
/// first `{` to the last `}`.
pub fn extract_json_object(response: &str) -> Option<&str> {
    extract_span(response, '{', '}')
}

/// Extract the outermost JSON array from model output
pub fn extract_json_array(response: &str) -> Option<&str> {
    extract_span(response, '[', ']')
}

fn extract_span(response: &str, open: char, close: char) -> Option<&str> {
    let start = response.find(open)?;
    let end = response.rfind(close)?;
    (end > start).then(|| &response[start..=end])
}
