//! `packline rules`: show how files would be processed.
//!
//! Prints, for every file, the rule it matches, how its result is emitted
//! and the chain in application order. Files matching no rule are shown as
//! pass-through.

use crate::config::PipelineConfig;
use crate::rules::{Rule, RuleSet};
use crate::utils::path::normalize_path;
use anyhow::{Result, bail};
use jwalk::WalkDir;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Directories never descended into.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git"];

/// One classified file.
#[derive(Debug)]
pub struct Classified<'r> {
    pub rel: String,
    pub rule: Option<&'r Rule>,
}

pub fn run_rules(config: &PipelineConfig, paths: &[PathBuf]) -> Result<()> {
    let rules = RuleSet::standard(config);
    let roots = if paths.is_empty() {
        default_roots(config)
    } else {
        paths.iter().map(|p| normalize_path(p)).collect()
    };

    let classified = classify(config, &rules, &roots)?;
    let width = classified.iter().map(|c| c.rel.len()).max().unwrap_or(0);
    for entry in &classified {
        match entry.rule {
            Some(rule) => println!(
                "{:<width$}  {} {} {}",
                entry.rel,
                rule.name.green(),
                format!("({})", rule.emit).dimmed(),
                rule.chain
            ),
            None => println!("{:<width$}  {}", entry.rel, "pass-through".yellow()),
        }
    }
    Ok(())
}

/// Directories of the configured entries.
fn default_roots(config: &PipelineConfig) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = config
        .build
        .entry
        .values()
        .filter_map(|entry| entry.parent().map(Path::to_path_buf))
        .collect();
    roots.sort();
    roots.dedup();
    roots
}

/// Classify every file under `roots`, sorted by relative path.
pub fn classify<'r>(
    config: &PipelineConfig,
    rules: &'r RuleSet,
    roots: &[PathBuf],
) -> Result<Vec<Classified<'r>>> {
    let mut files = Vec::new();
    for root in roots {
        if root.is_file() {
            files.push(root.clone());
        } else if root.is_dir() {
            files.extend(walk(root));
        } else {
            bail!("no such file or directory: {}", root.display());
        }
    }

    let mut classified: Vec<_> = files
        .iter()
        .map(|path| {
            let rel = config.root_relative(path);
            let rule = rules.match_path(&rel);
            Classified { rel, rule }
        })
        .collect();
    classified.sort_by(|a, b| a.rel.cmp(&b.rel));
    classified.dedup_by(|a, b| a.rel == b.rel);
    Ok(classified)
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    let name = e.file_name().to_str().unwrap_or_default();
                    !(e.file_type().is_dir() && IGNORED_DIRS.contains(&name))
                })
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::testing::project;

    #[test]
    fn test_classify_directory() {
        let (_dir, config) = project(&[
            ("src/bootstrap.ts", b""),
            ("src/theme.css", b""),
            ("src/flux_parser_bg.wasm", b""),
            ("src/other.wasm", b""),
            ("src/data.json", b""),
            ("src/node_modules/x/index.js", b""),
        ]);
        let rules = RuleSet::standard(&config);
        let classified = classify(&config, &rules, &default_roots(&config)).unwrap();

        let rows: Vec<(&str, Option<&str>)> = classified
            .iter()
            .map(|c| (c.rel.as_str(), c.rule.map(|r| r.name)))
            .collect();
        assert_eq!(
            rows,
            [
                ("src/bootstrap.ts", Some("script")),
                ("src/data.json", None),
                ("src/flux_parser_bg.wasm", Some("wasm-module")),
                ("src/other.wasm", Some("wasm-asset")),
                ("src/theme.css", Some("style")),
            ]
        );
    }

    #[test]
    fn test_missing_path() {
        let (_dir, config) = project(&[]);
        let rules = RuleSet::standard(&config);
        assert!(classify(&config, &rules, &[config.root_join("nope")]).is_err());
    }
}
