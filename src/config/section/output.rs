//! `[output]` section: naming templates for emitted artifacts.
//!
//! `{static}` is replaced by `build.static_dir`; the bracket tokens are
//! rendered by [`crate::naming`].
//!
//! ```toml
//! [output]
//! script = "{static}[name].[modulehash:10].js"
//! source_map = "{static}[name].[modulehash:10].js.map"
//! style = "{static}[contenthash:10].css"
//! style_chunk = "{static}[id].[contenthash:10].css"
//! binary_module = "{static}[modulehash:10].wasm"
//! asset = "{static}[contenthash:10].[ext]"
//! ```

use serde::{Deserialize, Serialize};

/// Placeholder for the static directory inside naming templates.
pub const STATIC_PLACEHOLDER: &str = "{static}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub script: String,
    /// Source map of a script; same `[name]` and module hash as the script.
    pub source_map: String,
    pub style: String,
    pub style_chunk: String,
    pub binary_module: String,
    pub asset: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            script: "{static}[name].[modulehash:10].js".into(),
            source_map: "{static}[name].[modulehash:10].js.map".into(),
            style: "{static}[contenthash:10].css".into(),
            style_chunk: "{static}[id].[contenthash:10].css".into(),
            binary_module: "{static}[modulehash:10].wasm".into(),
            asset: "{static}[contenthash:10].[ext]".into(),
        }
    }
}
