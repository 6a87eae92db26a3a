//! HTML utility functions.
//!
//! - `escape()`, `escape_attr()` - HTML entity escaping
//! - `is_void_element()` - Self-closing elements (link, meta, etc.)
//! - `Tag` - small builder for the tags injected into the entry document

use std::borrow::Cow;
use std::fmt::Write;

// =============================================================================
// HTML Escaping
// =============================================================================

/// Characters that require HTML escaping.
const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape HTML special characters in text content.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(ESCAPE_CHARS) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Escape HTML attribute values.
#[inline]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    escape(s)
}

// =============================================================================
// Element Classification
// =============================================================================

/// Check if an HTML tag is a void element (no closing tag).
#[inline]
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

// =============================================================================
// Tag Builder
// =============================================================================

/// A single start tag (plus end tag for non-void elements).
///
/// ```ignore
/// Tag::new("link").attr("rel", "stylesheet").attr("href", "/a.css").render()
/// // <link rel="stylesheet" href="/a.css">
/// ```
#[derive(Debug, Clone)]
pub struct Tag<'a> {
    name: &'a str,
    attrs: Vec<(&'a str, Cow<'a, str>)>,
}

impl<'a> Tag<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &'a str, value: impl Into<Cow<'a, str>>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (name, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
        }
        out.push('>');
        if !is_void_element(self.name) {
            let _ = write!(out, "</{}>", self.name);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<script>"), "&lt;script&gt;");
        assert!(matches!(escape("hello"), Cow::Borrowed(_)));
        assert_eq!(escape_attr("a\"b"), "a&quot;b");
    }

    #[test]
    fn test_element_classes() {
        assert!(is_void_element("link"));
        assert!(is_void_element("base"));
        assert!(!is_void_element("script"));
    }

    #[test]
    fn test_tag_render() {
        let link = Tag::new("link")
            .attr("rel", "stylesheet")
            .attr("href", "/static/a.css")
            .render();
        assert_eq!(link, r#"<link rel="stylesheet" href="/static/a.css">"#);

        let script = Tag::new("script")
            .attr("type", "module")
            .attr("src", "/x.js?a=1&b=2")
            .render();
        assert_eq!(
            script,
            r#"<script type="module" src="/x.js?a=1&amp;b=2"></script>"#
        );
    }
}
