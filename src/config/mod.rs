//! Pipeline configuration management for `packline.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! ├── types/         # ConfigError, diagnostics, field paths
//! ├── util.rs        # config file discovery
//! └── mod.rs         # PipelineConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section       | Purpose                                            |
//! |---------------|----------------------------------------------------|
//! | `[build]`     | Entries, output, static dir, vendor manifest       |
//! | `[output]`    | Naming templates of emitted artifacts              |
//! | `[resolve]`   | Aliases and extension priority                     |
//! | `[rules]`     | Rule table knobs                                   |
//! | `[html]`      | Entry document template, favicon, minification     |
//! | `[clean]`     | Output cleaning                                    |
//! | `[stats]`     | Warning filters and asset table                    |
//! | `[typecheck]` | Background type checker                            |
//!
//! The config is loaded once per invocation and never mutated afterwards.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{
    BuildSectionConfig, CleanConfig, HtmlConfig, HtmlMinifyConfig, OutputConfig, ResolveConfig,
    RulesConfig, STATIC_PLACEHOLDER, StatsConfig, TypecheckConfig,
};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::{
    cli::{BuildArgs, Cli, Commands},
    core::BuildMode,
    log,
    naming::NameTemplate,
    utils::path::normalize_path,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "packline.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing packline.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Whether the build runs in development mode (CLI only).
    #[serde(skip)]
    pub dev: bool,

    #[serde(default)]
    pub build: BuildSectionConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub resolve: ResolveConfig,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub html: HtmlConfig,

    #[serde(default)]
    pub clean: CleanConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub typecheck: TypecheckConfig,
}

impl PipelineConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file. The project root is
    /// the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            bail!(
                "config file '{}' not found in the current directory or its parents",
                cli.config.display()
            );
        };

        let mut config = Self::from_path(&config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = normalize_path(&config_path);

        if let Commands::Build { build_args } = &cli.command {
            config.apply_build_args(build_args);
        }
        config.finalize(&root);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Default configuration rooted at `root`, with paths normalized.
    #[cfg(test)]
    pub fn at_root(root: &Path) -> Self {
        let mut config = Self::default();
        config.config_path = root.join(CONFIG_FILE);
        config.finalize(root);
        config
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Join a path with the root directory.
    #[cfg(test)]
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Get path relative to the project root, with `/` separators.
    pub fn root_relative(&self, path: impl AsRef<Path>) -> String {
        let path = path.as_ref();
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Build mode derived from `--dev` and `build.minify`.
    pub fn mode(&self) -> BuildMode {
        if !self.dev && self.build.minify {
            BuildMode::PRODUCTION
        } else {
            BuildMode::DEVELOPMENT
        }
    }

    /// Render a naming template's `{static}` placeholder.
    pub fn expand_static(&self, template: &str) -> String {
        template.replace(STATIC_PLACEHOLDER, &self.build.static_dir)
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply build arguments from CLI.
    fn apply_build_args(&mut self, args: &BuildArgs) {
        crate::logger::set_verbose(args.verbose);

        Self::update_option(&mut self.build.output, args.output.as_ref());
        Self::update_option(&mut self.build.minify, args.minify.as_ref());
        self.dev = args.dev;
        if args.coverage {
            self.build.coverage = true;
        }
        if args.no_typecheck {
            self.typecheck.enable = false;
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Normalize all paths relative to root directory.
    fn finalize(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.root = root.clone();

        self.build.output = normalize_path(&root.join(&self.build.output));
        for path in self.build.entry.values_mut() {
            *path = root.join(&*path);
        }
        if let Some(manifest) = self.build.vendor_manifest.take() {
            self.build.vendor_manifest = Some(root.join(manifest));
        }
        for path in self.resolve.alias.values_mut() {
            *path = root.join(&*path);
        }
        self.html.template = root.join(&self.html.template);
        if let Some(favicon) = self.html.favicon.take() {
            self.html.favicon = Some(root.join(favicon));
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate the configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&mut diag);
        self.resolve.validate(&mut diag);
        self.rules.validate(&mut diag);
        self.stats.validate(&mut diag);
        self.typecheck.validate(&mut diag);
        section::validate_patterns(FieldPath::new("clean.keep"), &self.clean.keep, &mut diag);
        self.validate_templates(&mut diag);

        if self.build.output == self.root {
            diag.error_with_hint(
                FieldPath::new("build.output"),
                "output directory must not be the project root",
                "use a subdirectory such as `build`",
            );
        }

        diag.into_result()
            .map_err(ConfigError::Diagnostics)
            .context("invalid configuration")
    }

    fn validate_templates(&self, diag: &mut ConfigDiagnostics) {
        let templates = [
            (FieldPath::new("output.script"), &self.output.script),
            (FieldPath::new("output.source_map"), &self.output.source_map),
            (FieldPath::new("output.style"), &self.output.style),
            (FieldPath::new("output.style_chunk"), &self.output.style_chunk),
            (FieldPath::new("output.binary_module"), &self.output.binary_module),
            (FieldPath::new("output.asset"), &self.output.asset),
        ];
        for (field, template) in templates {
            if let Err(e) = NameTemplate::parse(&self.expand_static(template)) {
                diag.error(field, e.to_string());
            }
        }
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

/// Parse config, panicking on unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PipelineConfig {
    let (parsed, ignored) = PipelineConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
