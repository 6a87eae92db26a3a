//! `[resolve]` section: module resolution overrides.
//!
//! ```toml
//! [resolve]
//! extensions = [".tsx", ".ts", ".js", ".wasm"]
//!
//! [resolve.alias]
//! src = "src"
//! react = "node_modules/react"
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Specifier prefix → path (relative to the config file).
    pub alias: BTreeMap<String, PathBuf>,

    /// Extensions tried, in order, for extensionless specifiers.
    pub extensions: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            alias: BTreeMap::from([
                ("src".to_string(), PathBuf::from("src")),
                ("react".to_string(), PathBuf::from("node_modules/react")),
            ]),
            extensions: vec![".tsx".into(), ".ts".into(), ".js".into(), ".wasm".into()],
        }
    }
}

impl ResolveConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for ext in &self.extensions {
            if !ext.starts_with('.') {
                diag.error_with_hint(
                    FieldPath::new("resolve.extensions"),
                    format!("`{ext}` does not start with `.`"),
                    format!("use `.{ext}`"),
                );
            }
        }
    }
}
