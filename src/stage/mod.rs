//! Build stages and the driver that runs them.
//!
//! A build is a fixed list of [`Stage`]s. The driver calls each lifecycle
//! hook on every stage, in list order, before moving to the next hook:
//!
//! ```text
//! construct ──► setup ──► [module graph] ──► process_assets
//!           ──► [module code → assets] ──► emit ──► [write] ──► done
//! ```
//!
//! Stages are constructed before anything runs, so an unreadable template
//! or vendor manifest aborts the build before the output is touched.
//!
//! # Module Structure
//!
//! ```text
//! stage/
//! ├── clean.rs      # remove previous output
//! ├── html/         # entry document
//! ├── extract.rs    # standalone stylesheets per chunk
//! ├── vendor.rs     # pre-built vendor library linking
//! ├── typecheck.rs  # background type checker
//! ├── define.rs     # compile-time constants
//! └── progress.rs   # progress line
//! ```

mod clean;
mod define;
mod extract;
mod html;
mod progress;
mod typecheck;
mod vendor;

pub use clean::Clean;
pub use define::Define;
pub use extract::ExtractCss;
pub use html::Html;
pub use progress::Progress;
pub use typecheck::TypeCheck;
pub use vendor::VendorLink;

use crate::asset::Assets;
use crate::config::PipelineConfig;
use crate::core::{BuildMode, is_shutdown};
use crate::env::{Defines, EnvProjection};
use crate::graph::{Externals, GraphInput, ModuleGraph};
use crate::logger::ProgressLine;
use crate::naming::{OutputName, OutputNamer};
use crate::report::Report;
use crate::rules::RuleSet;
use anyhow::{Context, Result, bail};

/// One pass of the build. Every hook defaults to doing nothing.
pub trait Stage {
    fn name(&self) -> &'static str;

    /// Before any module is loaded.
    fn setup(&mut self, _ctx: &mut BuildContext<'_>) -> Result<()> {
        Ok(())
    }

    /// After the module graph is built, before module code becomes assets.
    fn process_assets(&mut self, _ctx: &mut BuildContext<'_>) -> Result<()> {
        Ok(())
    }

    /// After module code became assets, before anything is written.
    fn emit(&mut self, _ctx: &mut BuildContext<'_>) -> Result<()> {
        Ok(())
    }

    /// After the output was written.
    fn done(&mut self, _ctx: &mut BuildContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// State shared by the stages of one build.
pub struct BuildContext<'a> {
    pub config: &'a PipelineConfig,
    pub env: &'a EnvProjection,
    pub mode: BuildMode,
    pub namer: OutputNamer,
    pub rules: RuleSet,
    pub externals: Externals,
    pub defines: Defines,
    pub graph: ModuleGraph,
    pub assets: Assets,
    /// Stylesheets linked from the entry document, in entry order.
    pub entry_styles: Vec<OutputName>,
    pub report: Report,
    pub progress: Option<ProgressLine>,
}

impl<'a> BuildContext<'a> {
    pub fn new(config: &'a PipelineConfig, env: &'a EnvProjection) -> Result<Self> {
        Ok(Self {
            config,
            env,
            mode: config.mode(),
            namer: OutputNamer::new(config, env)?,
            rules: RuleSet::standard(config),
            externals: Externals::default(),
            defines: Defines::default(),
            graph: ModuleGraph::default(),
            assets: Assets::new(),
            entry_styles: Vec::new(),
            report: Report::new(&config.stats)?,
            progress: None,
        })
    }
}

/// What a successful build produced.
#[derive(Debug)]
pub struct BuildOutput {
    pub assets: Assets,
    pub report: Report,
}

/// Runs the stage list over one [`BuildContext`].
pub struct Driver<'a> {
    ctx: BuildContext<'a>,
    stages: Vec<Box<dyn Stage + 'a>>,
}

impl<'a> Driver<'a> {
    pub fn new(ctx: BuildContext<'a>, stages: Vec<Box<dyn Stage + 'a>>) -> Self {
        Self { ctx, stages }
    }

    /// The standard stage list, in its fixed order.
    pub fn standard(config: &'a PipelineConfig, env: &'a EnvProjection) -> Result<Self> {
        let stages: Vec<Box<dyn Stage + 'a>> = vec![
            Box::new(Clean::new(config)?),
            Box::new(Html::new(config)?),
            Box::new(ExtractCss),
            Box::new(VendorLink::new(config)?),
            Box::new(TypeCheck::new(config)),
            Box::new(Define),
            Box::new(Progress::default()),
        ];
        Ok(Self::new(BuildContext::new(config, env)?, stages))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(mut self) -> Result<BuildOutput> {
        crate::debug!("stage"; "order: {}", self.stage_names().join(", "));
        self.each("setup", |stage, ctx| stage.setup(ctx))?;

        let ctx = &mut self.ctx;
        ctx.graph = ModuleGraph::build(&GraphInput {
            config: ctx.config,
            rules: &ctx.rules,
            namer: &ctx.namer,
            defines: &ctx.defines,
            externals: &ctx.externals,
            progress: ctx.progress.as_ref(),
        })?;
        let diagnostics = ctx.graph.take_diagnostics();
        ctx.report.extend(diagnostics);

        self.each("process_assets", |stage, ctx| stage.process_assets(ctx))?;

        let ctx = &mut self.ctx;
        ctx.graph.emit_into(
            &mut ctx.assets,
            &ctx.namer,
            &ctx.externals,
            ctx.mode.minify,
        )?;

        self.each("emit", |stage, ctx| stage.emit(ctx))?;

        if is_shutdown() {
            bail!("build interrupted");
        }
        self.ctx.assets.write_to(&self.ctx.config.build.output)?;

        self.each("done", |stage, ctx| stage.done(ctx))?;

        Ok(BuildOutput {
            assets: self.ctx.assets,
            report: self.ctx.report,
        })
    }

    fn each(
        &mut self,
        hook: &str,
        mut f: impl FnMut(&mut (dyn Stage + 'a), &mut BuildContext<'a>) -> Result<()>,
    ) -> Result<()> {
        for stage in &mut self.stages {
            crate::debug!("stage"; "{} {}", stage.name(), hook);
            f(stage.as_mut(), &mut self.ctx)
                .with_context(|| format!("stage `{}` failed in {hook}", stage.name()))?;
        }
        Ok(())
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::env::RawEnv;
    use std::fs;

    pub const TEMPLATE: &str = "<!DOCTYPE html>\n<html>\n  <head>\n    <meta charset=\"utf-8\">\n    <title>App</title>\n    {{ header }}\n  </head>\n  <body>\n    <div id=\"root\"></div>\n    <script>window.REVISION = \"{{ revision }}\";</script>\n    {{ body }}\n  </body>\n</html>\n";

    /// A project with a template and no vendor manifest or type checker.
    pub fn project(files: &[(&str, &[u8])]) -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut all: Vec<(&str, &[u8])> = vec![("assets/index.html", TEMPLATE.as_bytes())];
        all.extend_from_slice(files);
        for (path, content) in all {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut config = PipelineConfig::at_root(dir.path());
        config.build.vendor_manifest = None;
        config.html.favicon = None;
        config.typecheck.enable = false;
        (dir, config)
    }

    pub fn env(config: &PipelineConfig, vars: &[(&str, &str)]) -> EnvProjection {
        let mut raw: RawEnv = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        raw.entry("GIT_SHA".into()).or_insert_with(|| "test".into());
        EnvProjection::project(&raw, config.get_root(), &config.build.static_dir)
    }

    pub fn read(config: &PipelineConfig, path: &str) -> String {
        fs::read_to_string(config.build.output.join(path)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{env, project, read};
    use super::*;
    use crate::naming::ArtifactKind;
    use std::fs;

    #[test]
    fn test_stage_order() {
        let (_dir, config) = project(&[]);
        let env = env(&config, &[]);
        let driver = Driver::standard(&config, &env).unwrap();
        assert_eq!(
            driver.stage_names(),
            ["clean", "html", "extract-css", "vendor-link", "type-check", "define", "progress"]
        );
    }

    #[test]
    fn test_tsx_entry_becomes_one_module_script() {
        let (_dir, mut config) = project(&[(
            "src/app.tsx",
            b"const App = (props: { name: string }) => <h1>{props.name}</h1>;\nconsole.log(App);\n",
        )]);
        config.build.entry = [("app".to_string(), config.root_join("src/app.tsx"))].into();
        let env = env(&config, &[]);
        let output = Driver::standard(&config, &env).unwrap().run().unwrap();

        let scripts: Vec<_> = output.assets.of_kind(ArtifactKind::Script).collect();
        assert_eq!(scripts.len(), 1);
        let (path, asset) = scripts[0];
        assert!(path.starts_with("static/app."));
        assert!(path.ends_with(".js"));

        let html = read(&config, "index.html");
        // minified markup may drop attribute quotes
        let script = html.find("<script type=").unwrap();
        assert!(html[script..].contains(&asset.public));
        assert!(config.build.output.join(path).is_file());

        // the map sits next to its script and is never linked from the page
        assert_eq!(output.assets.of_kind(ArtifactKind::SourceMap).count(), 1);
        assert!(config.build.output.join(format!("{path}.map")).is_file());
        assert!(!html.contains(".js.map"));
    }

    #[test]
    fn test_typecheck_failure_does_not_block_output() {
        let (_dir, mut config) = project(&[
            ("src/bootstrap.ts", b"import \"./theme.css\";\nconst n: number = \"no\";\nconsole.log(n);\n"),
            ("src/theme.css", b"body { margin: 0; }\n"),
        ]);
        config.typecheck.enable = true;
        config.typecheck.command = vec![
            "sh".into(),
            "-c".into(),
            "echo \"src/bootstrap.ts(2,7): error TS2322: Type 'string' is not assignable to type 'number'.\"; exit 2".into(),
        ];
        let env = env(&config, &[]);
        let output = Driver::standard(&config, &env).unwrap().run().unwrap();

        assert!(config.build.output.join("index.html").is_file());
        assert_eq!(output.assets.of_kind(ArtifactKind::Script).count(), 1);
        assert_eq!(output.assets.of_kind(ArtifactKind::Stylesheet).count(), 1);

        let advisories: Vec<_> = output.report.advisories().collect();
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].origin.as_deref(), Some("src/bootstrap.ts:2:7"));
        assert!(advisories[0].message.contains("TS2322"));
    }

    #[test]
    fn test_revision_changes_only_the_document() {
        let (_dir, config) = project(&[
            (
                "src/bootstrap.ts",
                b"import logo from \"./logo.png\";\nimport \"./theme.css\";\nconsole.log(logo);\n",
            ),
            ("src/logo.png", b"\x89PNG not really"),
            ("src/theme.css", b".a { color: red; }\n"),
        ]);

        let build = |sha: &str| {
            let env = env(&config, &[("GIT_SHA", sha)]);
            let output = Driver::standard(&config, &env).unwrap().run().unwrap();
            let mut names: Vec<String> = output
                .assets
                .iter()
                .filter(|(_, asset)| asset.kind != ArtifactKind::Document)
                .map(|(path, _)| path.to_string())
                .collect();
            names.sort();
            (names, read(&config, "index.html"))
        };

        let (names_a, html_a) = build("aaaaaaa");
        let (names_b, html_b) = build("bbbbbbb");
        assert_eq!(names_a, names_b);
        assert_ne!(html_a, html_b);
        assert!(html_a.contains("aaaaaaa"));
        assert!(html_b.contains("bbbbbbb"));
    }

    #[test]
    fn test_filtered_warnings_never_reported() {
        let (_dir, mut config) = project(&[
            (
                "src/bootstrap.ts",
                b"import { useState, useTransition } from \"react\";\nexport const locale = () => import(\"./locale\");\nexport const page = () => import(\"./pages/gone\");\nconsole.log(useState, useTransition);\n",
            ),
            (
                "build/vendor-manifest.json",
                br#"{"name": "vendor_lib", "content": {"./node_modules/react/index.js": {"id": 7, "exports": ["useState"]}}}"#,
            ),
            ("node_modules/react/index.js", b"module.exports = {};\n"),
        ]);
        config.build.vendor_manifest = Some(config.root_join("build/vendor-manifest.json"));
        let env = env(&config, &[]);
        let output = Driver::standard(&config, &env).unwrap().run().unwrap();

        let warnings: Vec<String> = output.report.warnings().map(|w| w.to_string()).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Can't resolve './pages/gone'"));
        assert_eq!(output.report.filtered(), 2);
    }

    #[test]
    fn test_missing_manifest_is_fatal_before_clean() {
        let (_dir, mut config) = project(&[
            ("src/bootstrap.ts", b"console.log(1);\n"),
            ("build/old.js", b"previous build"),
        ]);
        config.build.vendor_manifest = Some(config.root_join("build/vendor-manifest.json"));
        let env = env(&config, &[]);

        let err = Driver::standard(&config, &env).err().unwrap();
        assert!(format!("{err:#}").contains("vendor manifest"));
        assert!(config.build.output.join("old.js").is_file());
    }

    #[test]
    fn test_failed_build_writes_nothing() {
        let (_dir, config) = project(&[
            ("src/bootstrap.ts", b"import { ok } from \"./broken\";\nconsole.log(ok);\n"),
            ("src/broken.ts", b"export const = ;\n"),
        ]);
        let env = env(&config, &[]);
        let result = Driver::standard(&config, &env).unwrap().run();
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("src/broken.ts"));
        assert!(!config.build.output.join("index.html").exists());
        assert!(
            !config.build.output.exists()
                || fs::read_dir(&config.build.output).unwrap().next().is_none()
        );
    }
}
