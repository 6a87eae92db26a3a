//! Module graph.
//!
//! Starting from the configured entries, modules are loaded in parallel
//! waves: each wave reads, transforms and scans the modules discovered by
//! the previous one. Waves are processed in sorted path order so results
//! (including which error is reported first) are deterministic.
//!
//! # Module Structure
//!
//! ```text
//! graph/
//! ├── resolve.rs    # specifier → file / vendor external
//! ├── specifier.rs  # import scanning and rewriting
//! ├── external.rs   # vendor manifest and stub modules
//! ├── chunk.rs      # entry and async chunks
//! └── emit.rs       # final module code → assets
//! ```

mod chunk;
mod emit;
pub mod external;
mod resolve;
pub mod specifier;

pub use chunk::{Chunk, ChunkKind};
pub use external::{Externals, VendorManifest};
pub use resolve::{Resolved, Resolver};

use crate::config::PipelineConfig;
use crate::core::is_shutdown;
use crate::env::Defines;
use crate::logger::ProgressLine;
use crate::naming::{ArtifactKind, ArtifactSource, ModuleIdentity, OutputName, OutputNamer};
use crate::report::Diagnostic;
use crate::rules::{EmitAs, RuleSet};
use crate::transform::{Content, EmittedFile, Payload, StepContext, TransformError};
use anyhow::{Context, Result, bail};
use oxc_sourcemap::SourceMap;
use rayon::prelude::*;
use specifier::{ImportKind, ImportRef};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Where an import points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Module(PathBuf),
    External(String),
    /// Left as written: an unresolvable dynamic import, or an import of a
    /// pass-through file that is not followed.
    Unresolved,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub reference: ImportRef,
    pub target: Target,
}

/// A loaded and transformed module.
#[derive(Debug, Clone)]
pub struct Module {
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub rel: String,
    /// Name of the matching rule; `None` for pass-through files.
    pub rule: Option<&'static str>,
    pub emit: Option<EmitAs>,
    pub code: Content,
    /// Maps `code` back to the source file.
    pub source_map: Option<SourceMap>,
    pub style: Option<String>,
    pub extracted: bool,
    pub emitted: Vec<EmittedFile>,
    pub imports: Vec<Import>,
    pub identity: ModuleIdentity,
    pub output: Option<OutputName>,
    /// Where the source map of the emitted script goes.
    pub map_output: Option<OutputName>,
    /// Code prepended to the module when it is emitted.
    pub prelude: Option<String>,
}

impl Module {
    pub fn is_pass_through(&self) -> bool {
        self.rule.is_none()
    }

    /// Statically imported modules, in source order.
    pub fn static_deps(&self) -> impl Iterator<Item = &Path> {
        self.deps(ImportKind::Static)
    }

    pub fn dynamic_deps(&self) -> impl Iterator<Item = &Path> {
        self.deps(ImportKind::Dynamic)
    }

    fn deps(&self, kind: ImportKind) -> impl Iterator<Item = &Path> {
        self.imports.iter().filter_map(move |import| match &import.target {
            Target::Module(path) if import.reference.kind == kind => Some(path.as_path()),
            _ => None,
        })
    }
}

/// Everything the loader reads.
pub struct GraphInput<'a> {
    pub config: &'a PipelineConfig,
    pub rules: &'a RuleSet,
    pub namer: &'a OutputNamer,
    pub defines: &'a Defines,
    pub externals: &'a Externals,
    pub progress: Option<&'a ProgressLine>,
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: BTreeMap<PathBuf, Module>,
    /// Entry name → module path, in configuration order.
    entries: Vec<(String, PathBuf)>,
    /// Vendor request → names imported from it.
    externals_used: BTreeMap<String, BTreeSet<String>>,
    diagnostics: Vec<Diagnostic>,
}

impl ModuleGraph {
    /// Load every module reachable from the configured entries.
    pub fn build(input: &GraphInput<'_>) -> Result<Self> {
        let loader = Loader {
            input,
            resolver: Resolver::new(input.config, input.externals),
        };

        let mut graph = Self::default();
        for (name, path) in &input.config.build.entry {
            if !path.is_file() {
                bail!("entry `{}` not found: {}", name, path.display());
            }
            graph.entries.push((name.clone(), path.clone()));
        }

        let mut pending: BTreeSet<PathBuf> = graph.entries.iter().map(|(_, p)| p.clone()).collect();
        while !pending.is_empty() {
            if is_shutdown() {
                bail!("build interrupted");
            }
            let wave: Vec<PathBuf> = std::mem::take(&mut pending).into_iter().collect();
            if let Some(progress) = input.progress {
                progress.discover("modules", wave.len());
            }

            let loaded: Vec<Result<Loaded>> = wave
                .par_iter()
                .map(|path| {
                    let result = loader.load(path);
                    if let Some(progress) = input.progress {
                        progress.inc("modules");
                    }
                    result
                })
                .collect();

            for result in loaded {
                let Loaded {
                    module,
                    diagnostics,
                } = result?;
                graph.diagnostics.extend(diagnostics);
                for import in &module.imports {
                    match &import.target {
                        Target::Module(dep) => {
                            if !graph.modules.contains_key(dep) && !wave.contains(dep) {
                                pending.insert(dep.clone());
                            }
                        }
                        Target::External(request) => {
                            graph
                                .externals_used
                                .entry(request.clone())
                                .or_default()
                                .extend(import.reference.names.iter().cloned());
                        }
                        Target::Unresolved => {}
                    }
                }
                graph.modules.insert(module.path.clone(), module);
            }
        }

        graph.assign_names(input.namer)?;
        crate::debug!("graph"; "{} modules, {} externals", graph.modules.len(), graph.externals_used.len());
        Ok(graph)
    }

    fn assign_names(&mut self, namer: &OutputNamer) -> Result<()> {
        let mut entry_names: BTreeMap<&Path, &str> = BTreeMap::new();
        for (name, path) in &self.entries {
            entry_names.entry(path.as_path()).or_insert(name.as_str());
        }

        for module in self.modules.values_mut() {
            if module.is_pass_through() {
                module.output = Some(namer.name(&ArtifactSource::Verbatim {
                    rel_path: &module.rel,
                })?);
                continue;
            }
            let logical = entry_names
                .get(module.path.as_path())
                .map_or_else(|| logical_name(&module.path), |name| name.to_string());
            let name = |kind| {
                namer.name(&ArtifactSource::Module {
                    kind,
                    name: &logical,
                    identity: &module.identity,
                })
            };
            module.output = Some(name(ArtifactKind::Script)?);
            if module.source_map.is_some() {
                module.map_output = Some(name(ArtifactKind::SourceMap)?);
            }
        }
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&Module> {
        self.modules.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Module> {
        self.modules.get_mut(path)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn entries(&self) -> &[(String, PathBuf)] {
        &self.entries
    }

    /// Output names of the entry modules, in configuration order.
    pub fn entry_outputs(&self) -> Vec<&OutputName> {
        self.entries
            .iter()
            .filter_map(|(_, path)| self.modules.get(path)?.output.as_ref())
            .collect()
    }

    pub fn externals_used(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.externals_used
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// `[name]` of a non-entry module: its file stem, made URL-safe.
fn logical_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let safe: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if safe.is_empty() { "module".into() } else { safe }
}

/// Whether a pass-through file is an ES module whose imports are followed.
fn is_script_like(rel: &str) -> bool {
    let lower = rel.to_ascii_lowercase();
    lower.ends_with(".js") || lower.ends_with(".mjs")
}

// ============================================================================
// Loader
// ============================================================================

struct Loaded {
    module: Module,
    diagnostics: Vec<Diagnostic>,
}

struct Loader<'a> {
    input: &'a GraphInput<'a>,
    resolver: Resolver<'a>,
}

impl Loader<'_> {
    fn load(&self, path: &Path) -> Result<Loaded> {
        let config = self.input.config;
        let rel = config.root_relative(path);
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let rule = self.input.rules.match_path(&rel);

        let payload = match rule {
            Some(rule) => {
                let input = if rule.emit.is_text() {
                    let text = String::from_utf8(bytes).map_err(|_| TransformError {
                        path: path.to_path_buf(),
                        step: rule.name,
                        message: "source is not valid UTF-8".into(),
                    })?;
                    Payload::text(text)
                } else {
                    Payload::bytes(bytes)
                };
                let ctx = StepContext {
                    path,
                    rel_path: &rel,
                    namer: self.input.namer,
                    defines: self.input.defines,
                };
                rule.chain.apply(input, &ctx)?
            }
            None if is_script_like(&rel) => match String::from_utf8(bytes) {
                Ok(text) => Payload::text(text),
                Err(e) => Payload::bytes(e.into_bytes()),
            },
            None => Payload::bytes(bytes),
        };

        let mut diagnostics = Vec::new();
        let references = match &payload.code {
            Content::Text(code) if rule.is_some() => {
                specifier::scan(code).with_context(|| format!("failed to scan imports of {rel}"))?
            }
            // copied verbatim: imports are only followed to copy what they reach
            Content::Text(code) => specifier::scan(code).unwrap_or_else(|e| {
                diagnostics.push(Diagnostic::warning(
                    &rel,
                    format!("imports not followed, not an ES module: {e}"),
                ));
                Vec::new()
            }),
            Content::Bytes(_) => Vec::new(),
        };
        let dir = path.parent().unwrap_or(config.get_root());
        let mut imports = Vec::with_capacity(references.len());

        for reference in references {
            if rule.is_none() {
                let target = self.follow_verbatim(&rel, &reference, dir, &mut diagnostics);
                imports.push(Import { reference, target });
                continue;
            }
            let target = match self.resolver.resolve(&reference.specifier, dir) {
                Ok(Resolved::Module(dep)) => Target::Module(dep),
                Ok(Resolved::External(request)) => {
                    let missing = self
                        .input
                        .externals
                        .missing_exports(&request, &reference.names);
                    for name in missing {
                        diagnostics.push(Diagnostic::warning(
                            &rel,
                            format!(
                                "export '{name}' (imported as '{name}') was not found in '{}'",
                                reference.specifier
                            ),
                        ));
                    }
                    Target::External(request)
                }
                Err(e) if reference.kind == ImportKind::Dynamic => {
                    diagnostics.push(Diagnostic::warning(&rel, e.to_string()));
                    Target::Unresolved
                }
                Err(e) => return Err(anyhow::Error::new(e).context(format!("in {rel}"))),
            };
            imports.push(Import { reference, target });
        }

        let specifiers: Vec<&str> = imports
            .iter()
            .map(|i| i.reference.specifier.as_str())
            .collect();
        let identity = ModuleIdentity::new(&rel, &specifiers);

        let module = Module {
            path: path.to_path_buf(),
            rule: rule.map(|r| r.name),
            emit: rule.map(|r| r.emit),
            code: payload.code,
            source_map: payload.source_map,
            style: payload.style,
            extracted: payload.extracted,
            emitted: payload.emitted,
            imports,
            identity,
            output: None,
            map_output: None,
            prelude: None,
            rel,
        };
        Ok(Loaded {
            module,
            diagnostics,
        })
    }

    /// Target of an import in a pass-through file, whose text is never
    /// rewritten. Only other pass-through files are followed.
    fn follow_verbatim(
        &self,
        rel: &str,
        reference: &ImportRef,
        dir: &Path,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Target {
        match self.resolver.resolve(&reference.specifier, dir) {
            Ok(Resolved::Module(dep)) => {
                let dep_rel = self.input.config.root_relative(&dep);
                if self.input.rules.match_path(&dep_rel).is_none() {
                    return Target::Module(dep);
                }
                diagnostics.push(Diagnostic::warning(
                    rel,
                    format!(
                        "'{}' is emitted under a new name; this file is copied verbatim and still imports it as written",
                        reference.specifier
                    ),
                ));
                Target::Unresolved
            }
            Ok(Resolved::External(_)) => Target::Unresolved,
            Err(e) => {
                diagnostics.push(Diagnostic::warning(rel, e.to_string()));
                Target::Unresolved
            }
        }
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::env::{EnvProjection, RawEnv};

    /// Write `files` under a temporary root and return a config rooted there.
    pub fn project(files: &[(&str, &[u8])]) -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::TempDir::new().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut config = PipelineConfig::at_root(dir.path());
        config.build.vendor_manifest = None;
        (dir, config)
    }

    pub fn build(config: &PipelineConfig, externals: &Externals) -> Result<ModuleGraph> {
        let raw = RawEnv::from([("GIT_SHA".to_string(), "test".to_string())]);
        let env = EnvProjection::project(&raw, config.get_root(), &config.build.static_dir);
        let namer = OutputNamer::new(config, &env)?;
        let rules = RuleSet::standard(config);
        let defines = env.constants();
        ModuleGraph::build(&GraphInput {
            config,
            rules: &rules,
            namer: &namer,
            defines: &defines,
            externals,
            progress: None,
        })
    }
}
