//! Choosing a rendering strategy from response headers

use super::exchange::Headers;

/// How a response body should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// JSON, decoded and structurally truncated
    Structured,
    /// Text, shown as a byte-bounded prefix
    Textual,
    /// Image, passed through untouched
    Image,
    /// Anything else; the body is never fetched
    Opaque,
}

const TEXTUAL_APPLICATION_TYPES: &[&str] = &[
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/xml",
    "application/xhtml+xml",
    "application/x-www-form-urlencoded",
    "application/graphql",
    "application/yaml",
    "application/x-yaml",
    "application/toml",
    "application/csv",
    "application/sql",
    "application/x-ndjson",
    "application/x-sh",
];

/// Raw `content-type` header value, if any
pub fn content_type(headers: &Headers) -> Option<&str> {
    headers
        .get("content-type")
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Lowercased media type with parameters such as `charset` removed
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_structured(essence: &str) -> bool {
    essence == "application/json" || essence == "text/json" || essence.ends_with("+json")
}

fn is_textual(essence: &str) -> bool {
    essence.starts_with("text/")
        || essence.ends_with("+xml")
        || TEXTUAL_APPLICATION_TYPES.contains(&essence)
}

#[must_use]
pub fn classify(headers: &Headers) -> ContentKind {
    let Some(raw) = content_type(headers) else {
        return ContentKind::Opaque;
    };
    let essence = essence(raw);
    if is_structured(&essence) {
        ContentKind::Structured
    } else if is_textual(&essence) {
        ContentKind::Textual
    } else if raw.starts_with("image/") {
        ContentKind::Image
    } else {
        ContentKind::Opaque
    }
}
