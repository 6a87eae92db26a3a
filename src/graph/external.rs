//! Vendor library externals.
//!
//! A pre-built vendor library publishes a manifest mapping module requests
//! to ids. Imports of those requests are not bundled: each becomes a small
//! stub module delegating to the library's global require function.

use crate::transform::export_alias;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// `{ "name": "vendor_lib", "content": { "<request>": { "id": …, "exports": [...] } } }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorManifest {
    /// Global name the vendor library is exposed under.
    pub name: String,
    pub content: BTreeMap<String, VendorEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VendorEntry {
    pub id: serde_json::Value,
    /// Export names, when the manifest records them.
    #[serde(default)]
    pub exports: Option<Vec<String>>,
}

/// Requests provided by the vendor library.
#[derive(Debug, Clone, Default)]
pub struct Externals {
    library: String,
    entries: BTreeMap<String, VendorEntry>,
}

impl Externals {
    pub fn from_manifest(manifest: VendorManifest) -> Self {
        Self {
            library: manifest.name,
            entries: manifest.content,
        }
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn contains(&self, request: &str) -> bool {
        self.entries.contains_key(request)
    }

    pub fn get(&self, request: &str) -> Option<&VendorEntry> {
        self.entries.get(request)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names requested from `request` that its manifest entry does not export.
    ///
    /// Empty when the manifest does not record exports.
    pub fn missing_exports<'n>(&self, request: &str, names: &'n [String]) -> Vec<&'n str> {
        let Some(exports) = self.get(request).and_then(|e| e.exports.as_ref()) else {
            return Vec::new();
        };
        names
            .iter()
            .map(String::as_str)
            .filter(|name| *name != "default" && !exports.iter().any(|e| e == name))
            .collect()
    }

    /// Stub module for `request`. `used` are the names importers request;
    /// they are exported when the manifest does not list exports.
    pub fn stub(&self, request: &str, used: &BTreeSet<String>) -> Option<String> {
        let entry = self.get(request)?;
        let mut code = format!(
            "const __vendor = globalThis[{}]({});\nexport default __vendor;\n",
            serde_json::Value::String(self.library.clone()),
            entry.id
        );
        let names: BTreeSet<&str> = match &entry.exports {
            Some(exports) => exports.iter().map(String::as_str).collect(),
            None => used.iter().map(String::as_str).collect(),
        };
        for (i, name) in names.into_iter().filter(|n| *n != "default").enumerate() {
            let _ = writeln!(
                code,
                "const __vendor_{i} = __vendor[{}];\nexport {{ __vendor_{i} as {} }};",
                serde_json::Value::String(name.to_string()),
                export_alias(name)
            );
        }
        Some(code)
    }
}
