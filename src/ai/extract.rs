//! Best-effort scraping of a JSON object out of free-form model output.
//!
//! This is text matching, not parsing: callers must treat `None` (and any
//! later deserialization failure) as an ordinary outcome and fall back.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("valid fenced block regex")
});

static INLINE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`(\{[^`]*\})`").expect("valid inline span regex"));

static BARE_BRACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid bare braces regex"));

/// Locates a JSON object in `text`, trying a fenced code block, then an
/// inline code span, then the outermost pair of braces.
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    if let Some(caps) = INLINE_SPAN.captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    BARE_BRACES.find(text).map(|m| m.as_str())
}
