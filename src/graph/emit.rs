//! Final module code.
//!
//! Import specifiers are rewritten to the public paths of their targets,
//! preludes are prepended, and in production scripts are minified. Side
//! files produced by steps and vendor stub modules are emitted alongside.
//!
//! Pass-through files are written from their original bytes. The script of
//! an extracted stylesheet is dropped, together with the imports of it,
//! when nothing takes a binding from it. A script with a source map gets
//! the map written next to it and a `sourceMappingURL` comment.

use super::{Externals, Module, ModuleGraph, Target};
use crate::asset::Assets;
use crate::naming::{ArtifactKind, ArtifactSource, ModuleIdentity, OutputName, OutputNamer};
use crate::transform::Content;
use crate::transform::minify::{minify_js, minify_js_mapped};
use crate::transform::sourcemap::{Edit, apply, compose, splice};
use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

impl ModuleGraph {
    /// Add every module, side file and vendor stub to `assets`.
    pub fn emit_into(
        &self,
        assets: &mut Assets,
        namer: &OutputNamer,
        externals: &Externals,
        minify: bool,
    ) -> Result<()> {
        let stubs = self.emit_stubs(assets, namer, externals, minify)?;
        let elided = self.elided();

        for module in self.modules() {
            let Some(output) = &module.output else {
                continue;
            };

            for file in &module.emitted {
                assets.insert(file.name.clone(), file.kind, file.bytes.clone())?;
            }
            if elided.contains(module.path.as_path()) {
                continue;
            }

            let code = match &module.code {
                Content::Text(code) if !module.is_pass_through() => code,
                code => {
                    let kind = if module.is_pass_through() {
                        ArtifactKind::Verbatim
                    } else {
                        ArtifactKind::Script
                    };
                    assets.insert(output.clone(), kind, code.as_bytes().to_vec())?;
                    continue;
                }
            };

            let edits = self.link(module, &stubs, &elided);
            let (mut code, mut map) = match (&module.source_map, &module.map_output) {
                (Some(map), Some(_)) => {
                    let (code, map) = splice(code, &edits, Some(map), &module.rel);
                    (code, Some(map))
                }
                _ => (apply(code, &edits), None),
            };
            if minify {
                let (minified, outer) = minify_js_mapped(&code, map.is_some())
                    .with_context(|| format!("failed to minify {}", module.rel))?;
                code = minified;
                map = outer.zip(map).map(|(outer, inner)| compose(&outer, &inner));
            }

            if let (Some(mut map), Some(map_name)) = (map, &module.map_output) {
                let file = output.path.rsplit('/').next().unwrap_or(&output.path);
                map.set_file(file);
                if !code.ends_with('\n') {
                    code.push('\n');
                }
                let _ = writeln!(code, "//# sourceMappingURL={}", map_name.public);
                assets.insert(
                    map_name.clone(),
                    ArtifactKind::SourceMap,
                    map.to_json_string().into_bytes(),
                )?;
            }
            assets.insert(output.clone(), ArtifactKind::Script, code.into_bytes())?;
        }
        Ok(())
    }

    /// Extracted stylesheet modules whose script is never needed: not an
    /// entry, never loaded dynamically, and imported only for effect.
    fn elided(&self) -> FxHashSet<&Path> {
        let mut elided: FxHashSet<&Path> = self
            .modules()
            .filter(|module| module.extracted)
            .map(|module| module.path.as_path())
            .collect();
        for (_, entry) in self.entries() {
            elided.remove(entry.as_path());
        }
        for module in self.modules() {
            for import in &module.imports {
                if let Target::Module(dep) = &import.target
                    && !import.reference.bare
                {
                    elided.remove(dep.as_path());
                }
            }
        }
        elided
    }

    /// Edits pointing the imports of `module` at their emitted names.
    fn link(
        &self,
        module: &Module,
        stubs: &BTreeMap<String, OutputName>,
        elided: &FxHashSet<&Path>,
    ) -> Vec<Edit> {
        let mut edits = Vec::with_capacity(module.imports.len() + 1);
        if let Some(prelude) = &module.prelude {
            edits.push(Edit::insert(0, prelude.clone()));
        }
        for import in &module.imports {
            let public = match &import.target {
                Target::Module(path) if elided.contains(path.as_path()) => {
                    edits.push(Edit::remove(import.reference.statement.clone()));
                    continue;
                }
                Target::Module(path) => self.get(path).and_then(|dep| dep.output.as_ref()),
                Target::External(request) => stubs.get(request),
                Target::Unresolved => None,
            };
            if let Some(name) = public {
                let literal = serde_json::Value::String(name.public.clone()).to_string();
                edits.push(Edit::replace(import.reference.span.clone(), literal));
            }
        }
        edits
    }

    /// Stub modules for the vendor requests in use.
    fn emit_stubs(
        &self,
        assets: &mut Assets,
        namer: &OutputNamer,
        externals: &Externals,
        minify: bool,
    ) -> Result<BTreeMap<String, OutputName>> {
        let mut names = BTreeMap::new();
        for (request, used) in self.externals_used() {
            let Some(mut code) = externals.stub(request, used) else {
                continue;
            };
            let identity = ModuleIdentity::new(
                &format!("vendor:{}:{request}", externals.library()),
                &[] as &[&str],
            );
            let name = namer.name(&ArtifactSource::Module {
                kind: ArtifactKind::Script,
                name: &stub_name(request),
                identity: &identity,
            })?;
            if minify {
                code = minify_js(&code)
                    .with_context(|| format!("failed to minify vendor stub for {request}"))?;
            }
            assets.insert(name.clone(), ArtifactKind::Script, code.into_bytes())?;
            names.insert(request.clone(), name);
        }
        Ok(names)
    }
}

/// `[name]` of a vendor stub: the package name of the request.
fn stub_name(request: &str) -> String {
    let trimmed = request
        .trim_start_matches("./")
        .trim_start_matches("node_modules/");
    let package = trimmed.split('/').next().unwrap_or(trimmed);
    let safe: String = package
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("vendor-{safe}")
}
