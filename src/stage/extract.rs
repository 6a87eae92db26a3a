//! `extract-css`: standalone stylesheets per chunk.
//!
//! The extracted stylesheets of a chunk's modules are concatenated in
//! dependency order. Entry chunk stylesheets get a content-addressed name
//! and are linked from the entry document. Async chunk stylesheets get an
//! id-token name, and the chunk's root module attaches its stylesheet
//! when it is first loaded.

use super::{BuildContext, Stage};
use crate::embed::css_loader_prelude;
use crate::graph::{Chunk, ChunkKind};
use crate::naming::{ArtifactKind, ArtifactSource};
use crate::transform::minify::minify_css;
use anyhow::{Context, Result};

pub struct ExtractCss;

impl ExtractCss {
    /// Concatenated stylesheet of `chunk`, `None` when it has none.
    fn chunk_css(ctx: &BuildContext<'_>, chunk: &Chunk) -> Result<Option<String>> {
        let mut css = String::new();
        for path in &chunk.modules {
            let Some(module) = ctx.graph.get(path) else {
                continue;
            };
            if let (true, Some(style)) = (module.extracted, &module.style) {
                css.push_str(style);
                if !css.ends_with('\n') {
                    css.push('\n');
                }
            }
        }
        if css.is_empty() {
            return Ok(None);
        }
        if ctx.mode.minify {
            css = minify_css(&css)
                .with_context(|| format!("failed to minify stylesheet of chunk {}", chunk.kind))?;
        }
        Ok(Some(css))
    }
}

impl Stage for ExtractCss {
    fn name(&self) -> &'static str {
        "extract-css"
    }

    fn process_assets(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        for chunk in ctx.graph.chunks() {
            let Some(css) = Self::chunk_css(ctx, &chunk)? else {
                continue;
            };
            let bytes = css.into_bytes();

            let name = match chunk.kind {
                ChunkKind::Entry(_) => ctx.namer.name(&ArtifactSource::Content {
                    kind: ArtifactKind::Stylesheet,
                    ext: "css",
                    bytes: &bytes,
                })?,
                ChunkKind::Async(id) => ctx.namer.name(&ArtifactSource::StyleChunk {
                    id,
                    bytes: &bytes,
                })?,
            };
            crate::debug!("css"; "chunk {} -> {}", chunk.kind, name.path);

            match chunk.kind {
                ChunkKind::Entry(_) => {
                    if !ctx.entry_styles.contains(&name) {
                        ctx.entry_styles.push(name.clone());
                    }
                }
                ChunkKind::Async(_) => {
                    if let Some(root) = ctx.graph.get_mut(&chunk.root) {
                        root.prelude = Some(css_loader_prelude(&name.public));
                    }
                }
            }
            ctx.assets.insert(name, ArtifactKind::Stylesheet, bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::testing::{env, project};
    use crate::graph::{Externals, GraphInput, ModuleGraph};

    fn context_with_graph<'a>(
        config: &'a crate::config::PipelineConfig,
        env: &'a crate::env::EnvProjection,
    ) -> BuildContext<'a> {
        let mut ctx = BuildContext::new(config, env).unwrap();
        ctx.defines = env.constants();
        ctx.graph = ModuleGraph::build(&GraphInput {
            config,
            rules: &ctx.rules,
            namer: &ctx.namer,
            defines: &ctx.defines,
            externals: &Externals::default(),
            progress: None,
        })
        .unwrap();
        ctx
    }

    #[test]
    fn test_entry_and_async_stylesheets() {
        let (_dir, mut config) = project(&[
            (
                "src/bootstrap.ts",
                b"import \"./reset.css\";\nimport \"./theme.css\";\nexport const page = () => import(\"./page\");\n",
            ),
            ("src/reset.css", b"body { margin: 0; }\n"),
            ("src/theme.css", b".theme { color: red; }\n"),
            ("src/page.ts", b"import \"./page.css\";\nexport default 1;\n"),
            ("src/page.css", b".page { color: blue; }\n"),
        ]);
        config.build.minify = false;
        let env = env(&config, &[]);
        let mut ctx = context_with_graph(&config, &env);

        ExtractCss.process_assets(&mut ctx).unwrap();

        let sheets: Vec<_> = ctx.assets.of_kind(ArtifactKind::Stylesheet).collect();
        assert_eq!(sheets.len(), 2);

        assert_eq!(ctx.entry_styles.len(), 1);
        let entry = ctx.assets.get(&ctx.entry_styles[0].path).unwrap();
        let text = String::from_utf8(entry.bytes.clone()).unwrap();
        let reset = text.find("margin").unwrap();
        let theme = text.find(".theme").unwrap();
        assert!(reset < theme);
        assert!(!text.contains(".page"));

        let (chunk_path, _) = sheets
            .iter()
            .find(|(path, _)| *path != ctx.entry_styles[0].path)
            .unwrap();
        assert!(chunk_path.starts_with("static/1."));

        let page = ctx.graph.get(&config.root_join("src/page.ts")).unwrap();
        let prelude = page.prelude.as_deref().unwrap();
        assert!(prelude.contains(&format!("\"/{chunk_path}\"")));
        let entry_module = ctx.graph.get(&config.root_join("src/bootstrap.ts")).unwrap();
        assert!(entry_module.prelude.is_none());
    }

    #[test]
    fn test_no_styles_no_stylesheet() {
        let (_dir, config) = project(&[("src/bootstrap.ts", b"console.log(1);\n")]);
        let env = env(&config, &[]);
        let mut ctx = context_with_graph(&config, &env);
        ExtractCss.process_assets(&mut ctx).unwrap();
        assert!(ctx.entry_styles.is_empty());
        assert_eq!(ctx.assets.len(), 0);
    }
}
