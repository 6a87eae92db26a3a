//! `vendor-link`: resolve vendor library requests to externals.

use super::{BuildContext, Stage};
use crate::config::{ConfigError, PipelineConfig};
use crate::graph::{Externals, VendorManifest};
use anyhow::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub struct VendorLink {
    externals: Option<Externals>,
}

impl VendorLink {
    /// Read the configured manifest. A missing or malformed manifest is fatal.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let externals = match &config.build.vendor_manifest {
            Some(path) => Some(Externals::from_manifest(read_manifest(path)?)),
            None => None,
        };
        Ok(Self { externals })
    }
}

fn read_manifest(path: &Path) -> Result<VendorManifest, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::ManifestMissing(path.to_path_buf()),
        _ => ConfigError::Io(path.to_path_buf(), err),
    })?;
    serde_json::from_str(&content)
        .map_err(|err| ConfigError::ManifestMalformed(path.to_path_buf(), err))
}

impl Stage for VendorLink {
    fn name(&self) -> &'static str {
        "vendor-link"
    }

    fn setup(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        if let Some(externals) = self.externals.take() {
            crate::debug!("vendor"; "{} requests from `{}`", externals.len(), externals.library());
            ctx.externals = externals;
        }
        Ok(())
    }
}
