//! Chunks: groups of modules loaded together.
//!
//! Each entry starts an entry chunk holding everything it reaches through
//! static imports. Each dynamically imported module outside every entry
//! chunk starts an async chunk, numbered from 1 in path order.
//!
//! Modules are listed in dependency order (post-order over static imports
//! in source order), which is also the order their stylesheets apply in.

use super::ModuleGraph;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChunkKind {
    Entry(String),
    Async(usize),
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(name) => f.write_str(name),
            Self::Async(id) => write!(f, "#{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub root: PathBuf,
    pub modules: Vec<PathBuf>,
}

impl ModuleGraph {
    pub fn chunks(&self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut in_entries = FxHashSet::default();

        for (name, root) in &self.entries {
            let modules = self.static_closure(root, &FxHashSet::default());
            in_entries.extend(modules.iter().cloned());
            chunks.push(Chunk {
                kind: ChunkKind::Entry(name.clone()),
                root: root.clone(),
                modules,
            });
        }

        let async_roots: BTreeSet<&Path> = self
            .modules()
            .flat_map(|module| module.dynamic_deps())
            .filter(|dep| !in_entries.contains(*dep))
            .collect();

        for (index, root) in async_roots.into_iter().enumerate() {
            chunks.push(Chunk {
                kind: ChunkKind::Async(index + 1),
                root: root.to_path_buf(),
                modules: self.static_closure(root, &in_entries),
            });
        }
        chunks
    }

    /// Post-order static closure of `root`, skipping `exclude`.
    fn static_closure(&self, root: &Path, exclude: &FxHashSet<PathBuf>) -> Vec<PathBuf> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::new();
        self.visit(root, exclude, &mut visited, &mut order);
        order
    }

    fn visit(
        &self,
        path: &Path,
        exclude: &FxHashSet<PathBuf>,
        visited: &mut FxHashSet<PathBuf>,
        order: &mut Vec<PathBuf>,
    ) {
        if exclude.contains(path) || !visited.insert(path.to_path_buf()) {
            return;
        }
        let Some(module) = self.get(path) else {
            return;
        };
        for dep in module.static_deps() {
            self.visit(dep, exclude, visited, order);
        }
        order.push(path.to_path_buf());
    }
}
