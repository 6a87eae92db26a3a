//! Build report: warnings, advisories and the emitted asset table.
//!
//! Warnings matching `stats.warnings_filter` are dropped as they arrive and
//! never reach the output. Advisories (type-check findings) are shown but do
//! not affect the build result.

use crate::asset::Assets;
use crate::config::StatsConfig;
use crate::log;
use crate::utils::plural::{human_size, plural_count};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Module or file the diagnostic is about.
    pub origin: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            origin: Some(origin.into()),
            message: message.into(),
        }
    }

    pub fn advisory(origin: Option<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Advisory,
            origin,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{origin}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
    filtered: usize,
    warnings_filter: Vec<Regex>,
    exclude_assets: Vec<Regex>,
}

impl Report {
    pub fn new(stats: &StatsConfig) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| Regex::new(p).with_context(|| format!("invalid pattern `{p}`")))
                .collect()
        };
        Ok(Self {
            warnings_filter: compile(&stats.warnings_filter)?,
            exclude_assets: compile(&stats.exclude_assets)?,
            ..Self::default()
        })
    }

    /// Record a diagnostic, dropping warnings that match the filter.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Warning {
            let text = diagnostic.to_string();
            if self.warnings_filter.iter().any(|re| re.is_match(&text)) {
                crate::debug!("stats"; "filtered warning: {}", text);
                self.filtered += 1;
                return;
            }
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.of(Severity::Warning)
    }

    pub fn advisories(&self) -> impl Iterator<Item = &Diagnostic> {
        self.of(Severity::Advisory)
    }

    fn of(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
    }

    pub fn filtered(&self) -> usize {
        self.filtered
    }

    /// Emitted assets by descending size, without excluded ones.
    pub fn asset_table<'a>(&self, assets: &'a Assets) -> Vec<(&'a str, usize)> {
        let mut rows: Vec<_> = assets
            .iter()
            .filter(|(path, _)| !self.exclude_assets.iter().any(|re| re.is_match(path)))
            .map(|(path, asset)| (path, asset.size()))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        rows
    }

    /// Print the asset table and every kept diagnostic.
    pub fn print(&self, assets: &Assets) {
        let rows = self.asset_table(assets);
        let width = rows.iter().map(|(path, _)| path.len()).max().unwrap_or(0);
        for (path, size) in &rows {
            log!("emit"; "{:<width$}  {}", path, human_size(*size).dimmed());
        }

        for warning in self.warnings() {
            log!("warning"; "{}", warning);
        }
        for advisory in self.advisories() {
            log!("advisory"; "{}", advisory);
        }

        let warnings = self.warnings().count();
        let advisories = self.advisories().count();
        log!(
            "done";
            "{} ({}), {}, {}",
            plural_count(assets.len(), "asset"),
            human_size(assets.total_size()),
            plural_count(warnings, "warning"),
            plural_count(advisories, "advisory")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{ArtifactKind, OutputName};

    fn report() -> Report {
        Report::new(&StatsConfig::default()).unwrap()
    }

    #[test]
    fn test_default_filters_drop_noisy_warnings() {
        let mut report = report();
        report.push(Diagnostic::warning(
            "src/app.tsx",
            "export 'useTransition' (imported as 'useTransition') was not found in 'react'",
        ));
        report.push(Diagnostic::warning(
            "node_modules/moment/moment.js",
            "Module not found: Error: Can't resolve './locale' in '/p/node_modules/moment'",
        ));
        report.push(Diagnostic::warning(
            "src/app.tsx",
            "Module not found: Error: Can't resolve './pages/missing' in '/p/src'",
        ));
        report.push(Diagnostic::advisory(None, "src/a.ts(1,7): error TS2322: nope"));

        let warnings: Vec<_> = report.warnings().map(|w| w.message.as_str()).collect();
        assert_eq!(
            warnings,
            ["Module not found: Error: Can't resolve './pages/missing' in '/p/src'"]
        );
        assert_eq!(report.filtered(), 2);
        assert_eq!(report.advisories().count(), 1);
    }

    #[test]
    fn test_advisories_are_never_filtered() {
        let mut report = Report::new(&StatsConfig {
            warnings_filter: vec![".*".into()],
            ..StatsConfig::default()
        })
        .unwrap();
        report.push(Diagnostic::advisory(None, "anything"));
        report.push(Diagnostic::warning("a", "anything"));
        assert_eq!(report.advisories().count(), 1);
        assert_eq!(report.warnings().count(), 0);
    }

    #[test]
    fn test_asset_table_sorted_and_excluded() {
        let mut assets = Assets::new();
        let mut add = |path: &str, kind, size: usize| {
            let name = OutputName {
                path: path.into(),
                public: format!("/{path}"),
            };
            assets.insert(name, kind, vec![0; size]).unwrap();
        };
        add("static/small.js", ArtifactKind::Script, 10);
        add("static/big.js", ArtifactKind::Script, 100);
        add("static/a.woff", ArtifactKind::Font, 1000);
        add("index.html", ArtifactKind::Document, 50);

        let rows = report().asset_table(&assets);
        assert_eq!(
            rows,
            vec![("static/big.js", 100), ("index.html", 50), ("static/small.js", 10)]
        );
    }
}
