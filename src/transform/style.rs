//! Stylesheet steps: `style-compile`, `css-module` and `extract-style`.
//!
//! The style chain is declared `[extract-style, css-module, style-compile]`,
//! so a stylesheet is first compiled to plain CSS (through grass for
//! `.scss`), then wrapped into a module with its `url(...)` references
//! hashed, then extracted.

use super::{Content, EmittedFile, Payload, Step, StepContext};
use crate::naming::{ArtifactKind, ArtifactSource};
use anyhow::{Context, anyhow};
use lightningcss::dependencies::{Dependency, DependencyOptions};
use lightningcss::stylesheet::{
    MinifyOptions, ParserFlags, ParserOptions, PrinterOptions, StyleSheet,
};
use lightningcss::targets::{Browsers, Targets};
use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;
use std::path::Path;

/// Build lightningcss targets from `build.css_targets` (browser → major).
pub fn css_targets(versions: &BTreeMap<String, u32>) -> Browsers {
    let mut browsers = Browsers::default();
    for (name, major) in versions {
        let version = Some(major << 16);
        match name.as_str() {
            "android" => browsers.android = version,
            "chrome" => browsers.chrome = version,
            "edge" => browsers.edge = version,
            "firefox" => browsers.firefox = version,
            "ie" => browsers.ie = version,
            "ios_saf" => browsers.ios_saf = version,
            "opera" => browsers.opera = version,
            "safari" => browsers.safari = version,
            "samsung" => browsers.samsung = version,
            _ => {}
        }
    }
    browsers
}

// ============================================================================
// style-compile
// ============================================================================

/// Compiles Sass, then parses CSS (with nesting) and prints it lowered for
/// the targets.
pub struct StyleCompile {
    pub minify: bool,
    pub browsers: Browsers,
}

/// Whether `path` is Sass (SCSS syntax).
fn is_scss(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("scss"))
}

/// Compile SCSS to CSS; `@use` and `@import` resolve next to `path`.
fn compile_scss(source: &str, path: &Path) -> anyhow::Result<String> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let options = grass::Options::default().load_path(dir);
    grass::from_string(source.to_string(), &options).map_err(|e| anyhow!("{e}"))
}

impl StyleCompile {
    fn compile(&self, source: &str, filename: &str) -> anyhow::Result<String> {
        let targets = Targets::from(self.browsers);
        let options = ParserOptions {
            filename: filename.to_string(),
            flags: ParserFlags::NESTING,
            ..ParserOptions::default()
        };
        let mut sheet = StyleSheet::parse(source, options).map_err(|e| anyhow!("{e}"))?;
        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| anyhow!("{e}"))?;
        let printed = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| anyhow!("{e}"))?;
        Ok(printed.code)
    }
}

impl Step for StyleCompile {
    fn name(&self) -> &'static str {
        "style-compile"
    }

    fn describe(&self) -> String {
        format!("minify: {}", self.minify)
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload> {
        let source = input.expect_text()?;
        let css = if is_scss(ctx.path) {
            let css = compile_scss(source, ctx.path)?;
            self.compile(&css, ctx.rel_path)?
        } else {
            self.compile(source, ctx.rel_path)?
        };
        Ok(Payload {
            code: Content::Text(css),
            ..input
        })
    }
}

// ============================================================================
// css-module
// ============================================================================

/// URLs left as they are.
fn is_external_url(url: &str) -> bool {
    url.is_empty()
        || url.starts_with('#')
        || url.starts_with('/')
        || url.starts_with("data:")
        || url.contains("://")
}

/// `text` as a double-quoted CSS string.
fn css_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Moves the stylesheet into the side slot and replaces the module with one
/// that injects it. Local `url(...)` references become hashed assets.
pub struct CssModule {
    pub minify: bool,
}

impl CssModule {
    /// Reprint `css` with every `url(...)` pointing at its emitted file.
    ///
    /// lightningcss prints each reference as a quoted placeholder and
    /// reports it as a dependency; the placeholders are then replaced.
    fn rewrite_urls(
        &self,
        css: &str,
        ctx: &StepContext<'_>,
        emitted: &mut Vec<EmittedFile>,
    ) -> anyhow::Result<String> {
        let options = ParserOptions {
            filename: ctx.rel_path.to_string(),
            flags: ParserFlags::NESTING,
            ..ParserOptions::default()
        };
        let sheet = StyleSheet::parse(css, options).map_err(|e| anyhow!("{e}"))?;
        let printed = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                analyze_dependencies: Some(DependencyOptions {
                    remove_imports: false,
                }),
                ..PrinterOptions::default()
            })
            .map_err(|e| anyhow!("{e}"))?;

        let dir = ctx.path.parent().unwrap_or(Path::new("/"));
        let mut code = printed.code;
        for dependency in printed.dependencies.unwrap_or_default() {
            let (url, placeholder, local) = match &dependency {
                Dependency::Url(dep) => (&dep.url, &dep.placeholder, !is_external_url(&dep.url)),
                Dependency::Import(dep) => (&dep.url, &dep.placeholder, false),
            };
            let quoted = css_string(placeholder);
            if !code.contains(&quoted) {
                continue;
            }
            let target = if local {
                let (file, suffix) = Self::emit_url(url, dir, ctx)?;
                let public = format!("{}{}", file.name.public, suffix);
                if !emitted.iter().any(|known| known.name == file.name) {
                    emitted.push(file);
                }
                public
            } else {
                url.clone()
            };
            code = code.replace(&quoted, &css_string(&target));
        }
        Ok(code)
    }

    /// Emit the file a relative URL points to. Returns it with the URL's
    /// query/fragment suffix.
    fn emit_url<'u>(
        raw: &'u str,
        dir: &Path,
        ctx: &StepContext<'_>,
    ) -> anyhow::Result<(EmittedFile, &'u str)> {
        let split = raw.find(['?', '#']).unwrap_or(raw.len());
        let (target, suffix) = raw.split_at(split);
        let decoded = percent_decode_str(target).decode_utf8_lossy();
        let path = dir.join(decoded.as_ref());
        let bytes =
            std::fs::read(&path).with_context(|| format!("cannot resolve url({raw})"))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let kind = ArtifactKind::for_extension(&ext);
        let name = ctx.namer.name(&ArtifactSource::Content {
            kind,
            ext: &ext,
            bytes: &bytes,
        })?;
        Ok((EmittedFile { kind, name, bytes }, suffix))
    }
}

impl Step for CssModule {
    fn name(&self) -> &'static str {
        "css-module"
    }

    fn describe(&self) -> String {
        format!("minify: {}", self.minify)
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload> {
        let mut emitted = input.emitted.clone();
        let css = self.rewrite_urls(input.expect_text()?, ctx, &mut emitted)?;
        let literal = serde_json::Value::String(css.clone());
        let code = format!(
            "const css = {literal};\n\
             if (typeof document !== \"undefined\") {{\n  \
               const el = document.createElement(\"style\");\n  \
               el.textContent = css;\n  \
               document.head.appendChild(el);\n\
             }}\n\
             export default css;\n"
        );
        Ok(Payload {
            code: Content::Text(code),
            style: Some(css),
            emitted,
            ..input
        })
    }
}

// ============================================================================
// extract-style
// ============================================================================

/// Replaces the injecting module with an empty one; the side stylesheet is
/// collected into its chunk's file.
pub struct ExtractStyle;

/// Module body left behind by an extracted stylesheet.
pub const EXTRACTED_MODULE: &str = "export {};\n";

impl Step for ExtractStyle {
    fn name(&self) -> &'static str {
        "extract-style"
    }

    fn apply(&self, input: Payload, _: &StepContext<'_>) -> anyhow::Result<Payload> {
        if input.style.is_none() {
            anyhow::bail!("no stylesheet to extract");
        }
        Ok(Payload {
            code: Content::Text(EXTRACTED_MODULE.into()),
            extracted: true,
            ..input
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Defines;
    use crate::transform::Chain;
    use crate::transform::testing::with_ctx;
    use std::fs;

    fn compile(minify: bool) -> StyleCompile {
        StyleCompile {
            minify,
            browsers: css_targets(&BTreeMap::from([("chrome".to_string(), 80)])),
        }
    }

    #[test]
    fn test_css_targets() {
        let browsers = css_targets(&BTreeMap::from([
            ("chrome".to_string(), 80),
            ("safari".to_string(), 13),
        ]));
        assert_eq!(browsers.chrome, Some(80 << 16));
        assert_eq!(browsers.safari, Some(13 << 16));
        assert_eq!(browsers.firefox, None);
    }

    #[test]
    fn test_compile_flattens_nesting() {
        let css = compile(true)
            .compile(".a { color: red; .b { color: blue; } }", "a.scss")
            .unwrap();
        assert!(css.contains(".a .b"));
        assert!(!css.contains('\n'));
    }

    #[test]
    fn test_scss_variables_and_mixins() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/_palette.scss"), "$accent: #ff0000;\n").unwrap();
        let source = "@use \"palette\";\n$pad: 4px;\n@mixin card($radius) {\n  border-radius: $radius;\n  padding: $pad * 2;\n}\n.card {\n  @include card(3px);\n  color: palette.$accent;\n  .title { font-weight: bold; }\n}\n";
        fs::write(dir.path().join("src/card.scss"), source).unwrap();

        let out = with_ctx(dir.path(), "src/card.scss", &Defines::default(), |ctx| {
            compile(false).apply(Payload::text(source), ctx).unwrap()
        });
        let css = out.code.as_text().unwrap();
        assert!(css.contains("border-radius: 3px"));
        assert!(css.contains("padding: 8px"));
        assert!(css.contains("color: red"));
        assert!(css.contains(".card .title"));
        assert!(!css.contains('$'));
    }

    #[test]
    fn test_invalid_scss_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = with_ctx(dir.path(), "src/bad.scss", &Defines::default(), |ctx| {
            compile(false).apply(Payload::text(".a { color: $undefined; }"), ctx)
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_plain_css_is_not_sass() {
        let out = with_ctx(std::path::Path::new("/p"), "src/a.css", &Defines::default(), |ctx| {
            compile(true).apply(Payload::text(".a { width: calc(100% - 2px); }"), ctx).unwrap()
        });
        assert_eq!(out.code.as_text().unwrap(), ".a{width:calc(100% - 2px)}");
    }

    #[test]
    fn test_css_string() {
        assert_eq!(css_string("/static/a.png"), "\"/static/a.png\"");
        assert_eq!(css_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_external_urls() {
        assert!(is_external_url("data:image/png;base64,xx"));
        assert!(is_external_url("https://cdn.example/a.png"));
        assert!(is_external_url("/abs.png"));
        assert!(is_external_url("#frag"));
        assert!(!is_external_url("./img/a.png"));
        assert!(!is_external_url("img/a.png"));
    }

    #[test]
    fn test_style_chain_extracts_with_hashed_urls() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/img")).unwrap();
        fs::write(dir.path().join("src/img/logo one.png"), b"\x89PNG").unwrap();

        let chain = Chain::new(vec![
            Box::new(ExtractStyle),
            Box::new(CssModule { minify: false }),
            Box::new(compile(false)),
        ]);
        let source = ".logo { background: url('./img/logo%20one.png?v=1'); }\n.icon { background: url(img/logo%20one.png?v=1), url(data:image/gif;base64,R0lGOD); }\n.note::before { content: \"url(./missing.png)\"; }";
        let out = with_ctx(dir.path(), "src/app.css", &Defines::default(), |ctx| {
            chain.apply(Payload::text(source), ctx).unwrap()
        });

        assert!(out.extracted);
        assert_eq!(out.code, Content::Text(EXTRACTED_MODULE.into()));
        assert_eq!(out.emitted.len(), 1);
        let png = &out.emitted[0];
        assert_eq!(png.kind, ArtifactKind::Image);
        assert!(png.name.path.starts_with("static/"));
        assert!(png.name.path.ends_with(".png"));

        let style = out.style.unwrap();
        assert_eq!(style.matches(&format!("url(\"{}?v=1\")", png.name.public)).count(), 2);
        assert!(style.contains("url(\"data:image/gif;base64,R0lGOD\")"));
        assert!(style.contains("content: \"url(./missing.png)\""));
    }

    #[test]
    fn test_missing_url_target_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = with_ctx(dir.path(), "src/app.css", &Defines::default(), |ctx| {
            CssModule { minify: true }.apply(Payload::text(".a{background:url(missing.png)}"), ctx)
        });
        assert!(result.unwrap_err().to_string().contains("missing.png"));
    }

    #[test]
    fn test_extract_requires_stylesheet() {
        let result = with_ctx(std::path::Path::new("/p"), "a.css", &Defines::default(), |ctx| {
            ExtractStyle.apply(Payload::text("x"), ctx)
        });
        assert!(result.is_err());
    }
}
