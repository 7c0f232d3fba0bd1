use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag pattern"));
static HTML_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title pattern"));
static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("valid block pattern")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace"));

pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if max_bytes == 0 {
        return String::new();
    }
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &value[..end])
}

pub fn looks_like_html(content_type: &str, body: &str) -> bool {
    if content_type.to_lowercase().contains("html") {
        return true;
    }
    let head = body.trim_start().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Reduces an HTML error page (proxy or gateway pages) to readable text,
/// preferring its `<title>`.
pub fn summarize_html(body: &str, max_bytes: usize) -> String {
    if let Some(title) = HTML_TITLE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
        .filter(|t| !t.is_empty())
    {
        return truncate_utf8_prefix(&title, max_bytes);
    }
    let without_blocks = SCRIPT_OR_STYLE.replace_all(body, " ");
    let text = HTML_TAG.replace_all(&without_blocks, " ");
    truncate_utf8_prefix(&collapse_whitespace(&text), max_bytes)
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE.replace_all(value, " ").trim().to_string()
}
