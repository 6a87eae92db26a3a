//! Production minification of emitted scripts and stylesheet chunks.
//!
//! Uses oxc for JavaScript and lightningcss for CSS.

use anyhow::{Result, anyhow, bail};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use oxc_sourcemap::SourceMap;
use std::path::PathBuf;

/// Minify an ES module.
///
/// Top-level names stay intact so named exports keep working.
pub fn minify_js(source: &str) -> Result<String> {
    minify_js_mapped(source, false).map(|(code, _)| code)
}

/// [`minify_js`], plus a map from the result back to `source` when `map`
/// is set.
pub fn minify_js_mapped(source: &str, map: bool) -> Result<(String, Option<SourceMap>)> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(error) = ret.errors.first() {
        bail!("{}", error);
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(false),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let ret = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            source_map_path: map.then(|| PathBuf::from("input.js")),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program);
    Ok((ret.code, ret.map))
}

/// Minify plain CSS (already lowered for its targets).
pub fn minify_css(source: &str) -> Result<String> {
    let stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| anyhow!("{e}"))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("{e}"))?;
    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_js_keeps_exports() {
        let out = minify_js(
            "import { h } from \"./h.js\";\nexport const greeting = (name) => {\n  return h(\"hello \" + name);\n};\n",
        )
        .unwrap();
        assert!(out.contains("greeting"));
        assert!(out.contains("\"./h.js\""));
        assert!(out.len() < 90);
    }

    #[test]
    fn test_minify_js_mapped() {
        let source = "export function greeting(name) {\n  return \"hello \" + name;\n}\n";
        let (code, map) = minify_js_mapped(source, true).unwrap();
        assert_eq!(code, minify_js(source).unwrap());
        let map = map.unwrap();
        assert!(map.get_tokens().any(|token| token.get_src_line() == 1));
        assert!(minify_js_mapped(source, false).unwrap().1.is_none());
    }

    #[test]
    fn test_minify_js_rejects_invalid() {
        assert!(minify_js("export const = ;").is_err());
    }

    #[test]
    fn test_minify_css() {
        let out = minify_css(".a {\n  color: red;\n}\n\n.b { color: blue }\n").unwrap();
        assert_eq!(out, ".a{color:red}.b{color:#00f}");
    }
}
