//! Transform chains.
//!
//! A [`Chain`] is an ordered list of [`Step`]s. Steps are declared
//! outermost-first and applied innermost-first: the chain `[s1, s2, s3]`
//! computes `s1(s2(s3(input)))`. Every step is stateless configuration and
//! may run concurrently on different files.
//!
//! # Module Structure
//!
//! ```text
//! transform/
//! ├── define.rs   # define-constants
//! ├── script.rs   # type-strip, instrument
//! ├── style.rs    # style-compile, css-module, extract-style
//! ├── asset.rs    # file-emit
//! ├── wasm.rs       # wasm-module
//! ├── minify.rs     # production minification of emitted code
//! └── sourcemap.rs  # splicing and composing script source maps
//! ```

mod asset;
mod define;
pub mod minify;
mod script;
pub mod sourcemap;
mod style;
pub mod wasm;

pub use asset::FileEmit;
pub use define::DefineConstants;
pub use script::{Instrument, TypeStrip};
pub use style::{CssModule, ExtractStyle, StyleCompile, css_targets};
pub use wasm::WasmModule;

use crate::env::Defines;
use crate::naming::{ArtifactKind, OutputName, OutputNamer};
use oxc::syntax::identifier::is_identifier_name;
use oxc_sourcemap::SourceMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Payload
// ============================================================================

/// Module content flowing through a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file a step produced besides its module payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub kind: ArtifactKind,
    pub name: OutputName,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Payload {
    pub code: Content,
    /// Maps `code` back to the source file; `None` while `code` is the
    /// source itself or when no map is kept.
    pub source_map: Option<SourceMap>,
    /// Stylesheet carried alongside the module.
    pub style: Option<String>,
    /// The stylesheet is collected into a chunk file instead of injected.
    pub extracted: bool,
    pub emitted: Vec<EmittedFile>,
    /// The module links a WebAssembly binary.
    pub binary: bool,
}

impl Payload {
    pub fn text(code: impl Into<String>) -> Self {
        Self::new(Content::Text(code.into()))
    }

    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self::new(Content::Bytes(bytes))
    }

    fn new(code: Content) -> Self {
        Self {
            code,
            source_map: None,
            style: None,
            extracted: false,
            emitted: Vec::new(),
            binary: false,
        }
    }

    /// Text content, or an error naming what the step expected.
    pub fn expect_text(&self) -> anyhow::Result<&str> {
        self.code
            .as_text()
            .ok_or_else(|| anyhow::anyhow!("expected text input, got {} bytes", self.code.len()))
    }
}

/// `name` as written after `as` in an export clause: bare when it is an
/// identifier name (reserved words included), a string literal otherwise.
pub fn export_alias(name: &str) -> String {
    if is_identifier_name(name) {
        name.to_string()
    } else {
        serde_json::Value::String(name.to_string()).to_string()
    }
}

// ============================================================================
// Step
// ============================================================================

/// Per-file information available to every step.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Absolute source path.
    pub path: &'a Path,
    /// Path relative to the project root, `/`-separated.
    pub rel_path: &'a str,
    pub namer: &'a OutputNamer,
    pub defines: &'a Defines,
}

/// A single transformation.
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    /// Options of this step, as shown by `packline rules`.
    fn describe(&self) -> String {
        String::new()
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload>;
}

/// Failure of one step on one file.
#[derive(Debug, Error)]
#[error("{step} failed on {}: {message}", path.display())]
pub struct TransformError {
    pub path: PathBuf,
    pub step: &'static str,
    pub message: String,
}

// ============================================================================
// Chain
// ============================================================================

/// Steps in declaration order, applied in reverse.
#[derive(Default)]
pub struct Chain {
    steps: Vec<Box<dyn Step>>,
}

impl Chain {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &dyn Step> {
        self.steps.iter().map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply the last declared step first and the first declared step last.
    pub fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> Result<Payload, TransformError> {
        self.steps.iter().rev().try_fold(input, |payload, step| {
            step.apply(payload, ctx).map_err(|e| TransformError {
                path: ctx.path.to_path_buf(),
                step: step.name(),
                message: format!("{e:#}"),
            })
        })
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in self.steps() {
            if !first {
                f.write_str(" <- ")?;
            }
            first = false;
            f.write_str(step.name())?;
            let options = step.describe();
            if !options.is_empty() {
                write!(f, "{{{options}}}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chain[{self}]")
    }
}

// ============================================================================
// Test Helpers
// ============================================================================
