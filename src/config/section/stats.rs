//! `[stats]` section: what the final build report shows.
//!
//! ```toml
//! [stats]
//! warnings_filter = ["export .* was not found in", "'./locale' in"]
//! exclude_assets = ['\.(hot-update|woff|eot|ttf|svg|ico|png)']
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Warnings matching any of these regexes are dropped from the report.
    pub warnings_filter: Vec<String>,

    /// Assets matching any of these regexes are omitted from the asset table.
    pub exclude_assets: Vec<String>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            warnings_filter: vec!["export .* was not found in".into(), "'./locale' in".into()],
            exclude_assets: vec![r"\.(hot-update|woff|eot|ttf|svg|ico|png)".into()],
        }
    }
}

impl StatsConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        validate_patterns(
            FieldPath::new("stats.warnings_filter"),
            &self.warnings_filter,
            diag,
        );
        validate_patterns(
            FieldPath::new("stats.exclude_assets"),
            &self.exclude_assets,
            diag,
        );
    }
}

/// Report every pattern in `patterns` that is not a valid regex.
pub fn validate_patterns(field: FieldPath, patterns: &[String], diag: &mut ConfigDiagnostics) {
    for pattern in patterns {
        if let Err(e) = Regex::new(pattern) {
            diag.error(field, format!("invalid regex `{pattern}`: {e}"));
        }
    }
}
