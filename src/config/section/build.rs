//! `[build]`, `[clean]` and `[rules]` sections.
//!
//! # Example
//!
//! ```toml
//! [build]
//! entry = { app = "src/bootstrap.ts" }
//! output = "build"                               # relative to the config file
//! static_dir = "static/"                         # prefix of every hashed asset
//! vendor_manifest = "build/vendor-manifest.json" # pre-built vendor library index
//! minify = true
//! source_map = true                              # write static/[name].js.map per script
//! coverage = false                               # instrument scripts for coverage
//! css_targets = { chrome = 80, firefox = 78, safari = 13 }
//!
//! [clean]
//! keep = ["^vendor"]                             # output entries surviving the clean
//!
//! [rules]
//! binary_module = "flux_parser_bg.wasm"          # wasm linked as a module
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Entry points, by chunk name.
    pub entry: BTreeMap<String, PathBuf>,

    /// Build output directory.
    pub output: PathBuf,

    /// Directory (relative to output, trailing `/`) holding hashed assets.
    pub static_dir: String,

    /// Vendor library manifest; `None` disables vendor linking.
    pub vendor_manifest: Option<PathBuf>,

    /// Minify scripts, stylesheets and HTML.
    pub minify: bool,

    /// Write a source map next to every script.
    pub source_map: bool,

    /// Instrument scripts with coverage counters.
    pub coverage: bool,

    /// Browser major versions that stylesheets are lowered for.
    pub css_targets: BTreeMap<String, u32>,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            entry: BTreeMap::from([("app".to_string(), PathBuf::from("src/bootstrap.ts"))]),
            output: "build".into(),
            static_dir: "static/".into(),
            vendor_manifest: Some("build/vendor-manifest.json".into()),
            minify: true,
            source_map: true,
            coverage: false,
            css_targets: BTreeMap::from([
                ("chrome".to_string(), 80),
                ("firefox".to_string(), 78),
                ("safari".to_string(), 13),
            ]),
        }
    }
}

impl BuildSectionConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.entry.is_empty() {
            diag.error(
                FieldPath::new("build.entry"),
                "at least one entry point is required",
            );
        }
        if !self.static_dir.is_empty() && !self.static_dir.ends_with('/') {
            diag.error_with_hint(
                FieldPath::new("build.static_dir"),
                format!("`{}` must end with `/`", self.static_dir),
                format!("use `{}/`", self.static_dir),
            );
        }
        if self.static_dir.starts_with('/') {
            diag.error(
                FieldPath::new("build.static_dir"),
                "must be relative to the output directory",
            );
        }
        for browser in self.css_targets.keys() {
            if !KNOWN_BROWSERS.contains(&browser.as_str()) {
                diag.error_with_hint(
                    FieldPath::new("build.css_targets"),
                    format!("unknown browser `{browser}`"),
                    format!("expected one of: {}", KNOWN_BROWSERS.join(", ")),
                );
            }
        }
    }
}

/// Browsers accepted in `build.css_targets`.
pub const KNOWN_BROWSERS: &[&str] = &[
    "android", "chrome", "edge", "firefox", "ie", "ios_saf", "opera", "safari", "samsung",
];

/// `[clean]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Remove previous output before building.
    pub enable: bool,

    /// Regexes over top-level output entry names that are never removed.
    pub keep: Vec<String>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            enable: true,
            keep: vec!["^vendor".into()],
        }
    }
}

/// `[rules]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// File name of the WebAssembly module linked as a first-class module.
    pub binary_module: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            binary_module: "flux_parser_bg.wasm".into(),
        }
    }
}

impl RulesConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.binary_module.ends_with(".wasm") {
            diag.error(
                FieldPath::new("rules.binary_module"),
                format!("`{}` is not a .wasm file name", self.binary_module),
            );
        }
    }
}
