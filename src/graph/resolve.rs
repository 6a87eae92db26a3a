//! Module resolution.
//!
//! Order: vendor externals, aliases, relative and absolute paths, then bare
//! specifiers through `node_modules`. A candidate path is tried as a file,
//! with each configured extension appended, then as a directory (`index.*`).

use super::external::Externals;
use crate::config::PipelineConfig;
use crate::utils::path::{fs::lexical_clean, to_slash};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Module(PathBuf),
    /// Provided by the vendor library, keyed by manifest request.
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Module not found: Error: Can't resolve '{specifier}' in '{}'", dir.display())]
pub struct ResolveError {
    pub specifier: String,
    pub dir: PathBuf,
}

pub struct Resolver<'a> {
    root: &'a Path,
    /// Longest alias first.
    aliases: Vec<(&'a str, &'a Path)>,
    extensions: &'a [String],
    externals: &'a Externals,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a PipelineConfig, externals: &'a Externals) -> Self {
        let mut aliases: Vec<_> = config
            .resolve
            .alias
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self {
            root: config.get_root(),
            aliases,
            extensions: &config.resolve.extensions,
            externals,
        }
    }

    /// Resolve `specifier` imported from a module in `dir`.
    pub fn resolve(&self, specifier: &str, dir: &Path) -> Result<Resolved, ResolveError> {
        if self.externals.contains(specifier) {
            return Ok(Resolved::External(specifier.to_string()));
        }

        let found = self
            .alias_target(specifier)
            .and_then(|base| self.try_path(&base))
            .or_else(|| {
                if is_relative(specifier) {
                    self.try_path(&dir.join(specifier))
                } else if specifier.starts_with('/') {
                    self.try_path(&self.root.join(specifier.trim_start_matches('/')))
                } else {
                    self.try_node_modules(specifier, dir)
                }
            });

        let Some(path) = found.map(|p| lexical_clean(&p)) else {
            return Err(ResolveError {
                specifier: specifier.to_string(),
                dir: dir.to_path_buf(),
            });
        };

        // Manifest requests are root-relative paths (`./node_modules/…`)
        let rel = path.strip_prefix(self.root).unwrap_or(&path);
        let request = format!("./{}", to_slash(rel));
        if self.externals.contains(&request) {
            return Ok(Resolved::External(request));
        }
        Ok(Resolved::Module(path))
    }

    fn alias_target(&self, specifier: &str) -> Option<PathBuf> {
        self.aliases.iter().find_map(|(name, target)| {
            if specifier == *name {
                Some(target.to_path_buf())
            } else {
                specifier
                    .strip_prefix(name)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| target.join(rest))
            }
        })
    }

    fn try_path(&self, base: &Path) -> Option<PathBuf> {
        self.try_file(base).or_else(|| self.try_directory(base))
    }

    fn try_file(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        let name = base.file_name()?.to_string_lossy().into_owned();
        self.extensions
            .iter()
            .map(|ext| base.with_file_name(format!("{name}{ext}")))
            .find(|candidate| candidate.is_file())
    }

    fn try_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }
        if let Some(entry) = package_entry(dir)
            && let Some(found) = self.try_file(&dir.join(entry))
        {
            return Some(found);
        }
        self.try_file(&dir.join("index"))
    }

    /// Walk up from `dir` to the project root looking in `node_modules`.
    fn try_node_modules(&self, specifier: &str, dir: &Path) -> Option<PathBuf> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let candidate = dir.join("node_modules").join(specifier);
            if let Some(found) = self.try_path(&candidate) {
                return Some(found);
            }
            if dir == self.root {
                break;
            }
            current = dir.parent();
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

#[derive(Deserialize)]
struct PackageJson {
    module: Option<String>,
    main: Option<String>,
}

/// `module` or `main` of a package directory.
fn package_entry(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join("package.json")).ok()?;
    let package: PackageJson = serde_json::from_str(&content).ok()?;
    package.module.or(package.main)
}
