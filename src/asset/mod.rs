//! In-memory output assets.
//!
//! Everything a build produces is collected here, keyed by its path relative
//! to the output directory, and only written once the whole build succeeded.
//! Documents are written last, through a temporary file and a rename, so a
//! directory with an `index.html` is always complete.

use crate::naming::{ArtifactKind, OutputName};
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub kind: ArtifactKind,
    /// URL the application references it by.
    pub public: String,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Default)]
pub struct Assets {
    map: BTreeMap<String, Asset>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset. The same path may be added again only with the same
    /// bytes (content-addressed names repeat when files are shared).
    pub fn insert(&mut self, name: OutputName, kind: ArtifactKind, bytes: Vec<u8>) -> Result<()> {
        if let Some(existing) = self.map.get(&name.path) {
            if existing.bytes != bytes {
                bail!("two different outputs would be written to `{}`", name.path);
            }
            return Ok(());
        }
        self.map.insert(
            name.path,
            Asset {
                kind,
                public: name.public,
                bytes,
            },
        );
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Asset> {
        self.map.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Asset)> {
        self.map.iter().map(|(path, asset)| (path.as_str(), asset))
    }

    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = (&str, &Asset)> {
        self.iter().filter(move |(_, asset)| asset.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.map.values().map(Asset::size).sum()
    }

    /// Write every asset under `output`, documents last.
    pub fn write_to(&self, output: &Path) -> Result<()> {
        fs::create_dir_all(output)
            .with_context(|| format!("failed to create {}", output.display()))?;

        let (documents, files): (Vec<_>, Vec<_>) = self
            .iter()
            .partition(|(_, asset)| asset.kind == ArtifactKind::Document);

        for (path, asset) in files {
            let target = output.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &asset.bytes)
                .with_context(|| format!("failed to write {}", target.display()))?;
        }

        for (path, asset) in documents {
            write_atomic(&output.join(path), &asset.bytes)?;
        }
        Ok(())
    }
}

/// Write through a sibling temporary file and rename it into place.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let Some(parent) = target.parent() else {
        bail!("invalid output path {}", target.display());
    };
    fs::create_dir_all(parent)?;
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));
    fs::write(&temp, bytes).with_context(|| format!("failed to write {}", temp.display()))?;
    fs::rename(&temp, target)
        .with_context(|| format!("failed to move {} into place", target.display()))?;
    Ok(())
}
