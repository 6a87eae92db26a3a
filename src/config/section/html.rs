//! `[html]` section: entry document generation.
//!
//! ```toml
//! [html]
//! template = "assets/index.html"
//! favicon = "assets/images/favicon.ico"
//! filename = "index.html"
//!
//! [html.minify]
//! remove_comments = true
//! keep_closing_tags = true
//! keep_html_and_head_opening_tags = true
//! minify_css = true
//! minify_js = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    /// Template file (relative to the config file).
    pub template: PathBuf,

    /// Favicon copied to the output root and linked from `<head>`.
    pub favicon: Option<PathBuf>,

    /// Name of the generated document inside the output directory.
    pub filename: String,

    /// Minification switches, applied in production builds.
    pub minify: HtmlMinifyConfig,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            template: "assets/index.html".into(),
            favicon: Some("assets/images/favicon.ico".into()),
            filename: "index.html".into(),
            minify: HtmlMinifyConfig::default(),
        }
    }
}

/// Switches handed to the HTML minifier in production builds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlMinifyConfig {
    pub remove_comments: bool,
    pub keep_closing_tags: bool,
    pub keep_html_and_head_opening_tags: bool,
    /// Minify inline `<style>` blocks and `style` attributes.
    pub minify_css: bool,
    /// Minify inline `<script>` blocks.
    pub minify_js: bool,
}

impl Default for HtmlMinifyConfig {
    fn default() -> Self {
        Self {
            remove_comments: true,
            keep_closing_tags: true,
            keep_html_and_head_opening_tags: true,
            minify_css: true,
            minify_js: true,
        }
    }
}
