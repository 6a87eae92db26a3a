//! Output naming.
//!
//! Every emitted artifact gets its name here, as a pure function of its
//! category and its content or module identity:
//!
//! - images, fonts, generic binaries and stylesheets are content-addressed
//!   (identical bytes, identical name, across builds);
//! - scripts and the linked binary module use a module-identity hash that
//!   depends on the module graph structure, not on bytes;
//! - a script's source map shares its `[name]` and module hash;
//! - async stylesheet chunks combine the chunk id with a content hash;
//! - pass-through files keep their source-relative path.
//!
//! Nothing here reads the clock, the process id or any global state.

mod template;

pub use template::{NameError, NameInput, NameTemplate};

use crate::config::PipelineConfig;
use crate::env::EnvProjection;
use anyhow::Result;
use std::fmt;

/// blake3 of `bytes` as lowercase hex (64 chars).
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

// ============================================================================
// ModuleIdentity
// ============================================================================

/// Structural identity of a module: its context-relative path plus the
/// specifiers it requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleIdentity([u8; 32]);

impl ModuleIdentity {
    /// Order of `specifiers` does not matter.
    pub fn new<S: AsRef<str>>(rel_path: &str, specifiers: &[S]) -> Self {
        let mut sorted: Vec<&str> = specifiers.iter().map(AsRef::as_ref).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut hasher = blake3::Hasher::new();
        hasher.update(rel_path.as_bytes());
        for specifier in sorted {
            hasher.update(b"\0");
            hasher.update(specifier.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// Logical category of an emitted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Script,
    /// Source map of a script.
    SourceMap,
    Stylesheet,
    BinaryModule,
    Image,
    Font,
    /// Binary copied as an opaque asset (generic `.wasm`).
    Binary,
    Document,
    /// Pass-through copy of a file matching no rule.
    Verbatim,
}

impl ArtifactKind {
    /// Category of a copied asset by its extension (no dot, any case).
    pub fn for_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "svg" | "jpg" | "jpeg" | "gif" | "webp" | "ico" | "avif" => Self::Image,
            "woff" | "woff2" | "eot" | "ttf" | "otf" => Self::Font,
            "css" => Self::Stylesheet,
            "js" | "mjs" => Self::Script,
            "map" => Self::SourceMap,
            "html" => Self::Document,
            _ => Self::Binary,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::SourceMap => "source-map",
            Self::Stylesheet => "stylesheet",
            Self::BinaryModule => "binary-module",
            Self::Image => "image",
            Self::Font => "font",
            Self::Binary => "binary",
            Self::Document => "document",
            Self::Verbatim => "verbatim",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the namer needs to know about an artifact.
#[derive(Debug, Clone, Copy)]
pub enum ArtifactSource<'a> {
    /// Content-addressed asset (image, font, binary, entry stylesheet).
    Content {
        kind: ArtifactKind,
        ext: &'a str,
        bytes: &'a [u8],
    },
    /// Script, its source map or binary module, named by identity.
    Module {
        kind: ArtifactKind,
        name: &'a str,
        identity: &'a ModuleIdentity,
    },
    /// Stylesheet of an async chunk.
    StyleChunk { id: usize, bytes: &'a [u8] },
    /// File copied unchanged, keeping its relative path.
    Verbatim { rel_path: &'a str },
    /// The generated entry document.
    Document { filename: &'a str },
}

/// Final location of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputName {
    /// Path relative to the output directory, `/`-separated.
    pub path: String,
    /// URL the application references it by (base path + path).
    pub public: String,
}

/// Renders [`OutputName`]s from the configured templates.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    script: NameTemplate,
    source_map: NameTemplate,
    style: NameTemplate,
    style_chunk: NameTemplate,
    binary_module: NameTemplate,
    asset: NameTemplate,
    base_path: String,
}

impl OutputNamer {
    pub fn new(config: &PipelineConfig, env: &EnvProjection) -> Result<Self> {
        let parse = |template: &str| NameTemplate::parse(&config.expand_static(template));
        Ok(Self {
            script: parse(&config.output.script)?,
            source_map: parse(&config.output.source_map)?,
            style: parse(&config.output.style)?,
            style_chunk: parse(&config.output.style_chunk)?,
            binary_module: parse(&config.output.binary_module)?,
            asset: parse(&config.output.asset)?,
            base_path: env.base_path.clone(),
        })
    }

    pub fn name(&self, source: &ArtifactSource<'_>) -> Result<OutputName, NameError> {
        let path = match *source {
            ArtifactSource::Content { kind, ext, bytes } => {
                let template = match kind {
                    ArtifactKind::Stylesheet => &self.style,
                    _ => &self.asset,
                };
                template.render(&NameInput {
                    ext,
                    content: Some(bytes),
                    ..Default::default()
                })?
            }
            ArtifactSource::Module {
                kind,
                name,
                identity,
            } => {
                let template = match kind {
                    ArtifactKind::BinaryModule => &self.binary_module,
                    ArtifactKind::SourceMap => &self.source_map,
                    _ => &self.script,
                };
                template.render(&NameInput {
                    name,
                    identity: Some(identity),
                    ..Default::default()
                })?
            }
            ArtifactSource::StyleChunk { id, bytes } => self.style_chunk.render(&NameInput {
                id: Some(id),
                content: Some(bytes),
                ..Default::default()
            })?,
            ArtifactSource::Verbatim { rel_path } => rel_path.trim_start_matches('/').to_string(),
            ArtifactSource::Document { filename } => filename.to_string(),
        };

        Ok(OutputName {
            public: format!("{}{}", self.base_path, path),
            path,
        })
    }
}
