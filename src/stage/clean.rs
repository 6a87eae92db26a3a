//! `clean`: remove the previous build output.
//!
//! Top-level entries of the output directory are removed unless their name
//! matches one of `clean.keep` (by default the pre-built vendor library).
//! A missing output directory is not an error, so cleaning is idempotent.

use super::{BuildContext, Stage};
use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct Clean {
    enable: bool,
    output: PathBuf,
    keep: Vec<Regex>,
}

impl Clean {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let keep = config
            .clean
            .keep
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid clean.keep pattern `{p}`")))
            .collect::<Result<_>>()?;
        Ok(Self {
            enable: config.clean.enable,
            output: config.build.output.clone(),
            keep,
        })
    }

    fn keeps(&self, name: &str) -> bool {
        self.keep.iter().any(|re| re.is_match(name))
    }

    /// Remove everything not kept. Returns the number of removed entries.
    pub fn clean(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.output) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read output directory {}", self.output.display())
                });
            }
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.keeps(&name) {
                crate::debug!("clean"; "keeping {}", name);
                continue;
            }
            remove(&entry.path())?;
            removed += 1;
        }
        Ok(removed)
    }
}

fn remove(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            Err(e).with_context(|| format!("failed to remove {}", path.display()))
        }
        _ => Ok(()),
    }
}

impl Stage for Clean {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn setup(&mut self, _ctx: &mut BuildContext<'_>) -> Result<()> {
        if !self.enable {
            return Ok(());
        }
        let removed = self.clean()?;
        crate::debug!("clean"; "removed {} entries from {}", removed, self.output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::testing::project;

    #[test]
    fn test_clean_keeps_vendor() {
        let (_dir, config) = project(&[
            ("build/index.html", b"old"),
            ("build/static/app.1234.js", b"old"),
            ("build/vendor-manifest.json", b"{}"),
            ("build/vendor.js", b"lib"),
        ]);
        let clean = Clean::new(&config).unwrap();
        assert_eq!(clean.clean().unwrap(), 2);

        let output = &config.build.output;
        assert!(!output.join("index.html").exists());
        assert!(!output.join("static").exists());
        assert!(output.join("vendor-manifest.json").is_file());
        assert!(output.join("vendor.js").is_file());

        // idempotent
        assert_eq!(clean.clean().unwrap(), 0);
    }

    #[test]
    fn test_missing_output_is_fine() {
        let (_dir, config) = project(&[]);
        assert!(!config.build.output.exists());
        assert_eq!(Clean::new(&config).unwrap().clean().unwrap(), 0);
    }
}
