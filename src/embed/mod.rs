//! Runtime snippets embedded into emitted scripts.
//!
//! Sources live next to this file and are minified by `build.rs`.

/// Defines `globalThis.__packline_css(href)`, used by async chunks to attach
/// their extracted stylesheet.
pub const LOAD_CSS_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/load_css.min.js"));

/// Prelude for the root module of an async chunk that owns a stylesheet.
pub fn css_loader_prelude(href: &str) -> String {
    let href = serde_json::to_string(href).unwrap_or_else(|_| "\"\"".to_string());
    format!("{LOAD_CSS_JS}\n__packline_css({href});\n")
}
