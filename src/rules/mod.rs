//! Rule matching.
//!
//! A [`RuleSet`] is an ordered table of [`Rule`]s. The first rule whose
//! predicate matches a path wins; rules are never merged. A path matching no
//! rule is passed through unchanged.
//!
//! # Standard table
//!
//! | Rule          | Predicate                               | Chain                                               | Emit           |
//! |---------------|-----------------------------------------|-----------------------------------------------------|----------------|
//! | `wasm-module` | `flux_parser_bg.wasm`                   | `wasm-module`                                       | linked binary  |
//! | `wasm-asset`  | `.wasm`, file name not `flux_parser_bg` | `file-emit`                                         | copied asset   |
//! | `script`      | `.ts`, `.tsx`                           | `[instrument?] type-strip, define-constants`        | inline module  |
//! | `style`       | `.css`, `.scss`                         | `extract-style, css-module, style-compile`          | extracted file |
//! | `image`       | `.png`, `.svg`, `.jpg`, `.gif`          | `file-emit`                                         | copied asset   |
//! | `font`        | `.woff`, `.woff2`, `.eot`, `.ttf`, `.otf` | `file-emit`                                       | copied asset   |

mod predicate;

pub use predicate::Predicate;

use crate::config::PipelineConfig;
use crate::transform::{
    Chain, CssModule, DefineConstants, ExtractStyle, FileEmit, Instrument, Step, StyleCompile,
    TypeStrip, WasmModule, css_targets,
};
use std::fmt;

/// How a matched file ends up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitAs {
    /// Emitted as a script module.
    InlineModule,
    /// Stylesheet collected into its chunk's CSS file.
    ExtractedFile,
    /// Copied under a content-addressed name.
    CopiedAsset,
    /// Binary linked as a first-class module.
    LinkedBinary,
}

impl EmitAs {
    /// Whether the source is read as UTF-8 text.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::InlineModule | Self::ExtractedFile)
    }
}

impl fmt::Display for EmitAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InlineModule => "inline module",
            Self::ExtractedFile => "extracted file",
            Self::CopiedAsset => "copied asset",
            Self::LinkedBinary => "linked binary",
        })
    }
}

pub struct Rule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub chain: Chain,
    pub emit: EmitAs,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("predicate", &self.predicate)
            .field("chain", &self.chain)
            .field("emit", &self.emit)
            .finish()
    }
}

/// Ordered rule table.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The standard table, parameterized by the configuration.
    pub fn standard(config: &PipelineConfig) -> Self {
        let binary_module = config.rules.binary_module.clone();
        let binary_stem = binary_module
            .strip_suffix(".wasm")
            .unwrap_or(&binary_module)
            .to_string();

        let mut script: Vec<Box<dyn Step>> = Vec::new();
        if config.build.coverage {
            script.push(Box::new(Instrument));
        }
        script.push(Box::new(TypeStrip {
            source_map: config.build.source_map,
        }));
        script.push(Box::new(DefineConstants));

        let rules = vec![
            Rule {
                name: "wasm-module",
                predicate: Predicate::suffix([binary_module]),
                chain: Chain::new(vec![Box::new(WasmModule)]),
                emit: EmitAs::LinkedBinary,
            },
            Rule {
                name: "wasm-asset",
                predicate: Predicate::SuffixExcept {
                    suffix: ".wasm".into(),
                    except: binary_stem,
                },
                chain: Chain::new(vec![Box::new(FileEmit)]),
                emit: EmitAs::CopiedAsset,
            },
            Rule {
                name: "script",
                predicate: Predicate::suffix([".ts", ".tsx"]),
                chain: Chain::new(script),
                emit: EmitAs::InlineModule,
            },
            Rule {
                name: "style",
                predicate: Predicate::suffix([".css", ".scss"]),
                chain: Chain::new(vec![
                    Box::new(ExtractStyle),
                    Box::new(CssModule {
                        minify: config.mode().minify,
                    }),
                    Box::new(StyleCompile {
                        minify: config.mode().minify,
                        browsers: css_targets(&config.build.css_targets),
                    }),
                ]),
                emit: EmitAs::ExtractedFile,
            },
            Rule {
                name: "image",
                predicate: Predicate::suffix([".png", ".svg", ".jpg", ".gif"]),
                chain: Chain::new(vec![Box::new(FileEmit)]),
                emit: EmitAs::CopiedAsset,
            },
            Rule {
                name: "font",
                predicate: Predicate::suffix([".woff", ".woff2", ".eot", ".ttf", ".otf"]),
                chain: Chain::new(vec![Box::new(FileEmit)]),
                emit: EmitAs::CopiedAsset,
            },
        ];
        Self::new(rules)
    }

    /// First rule whose predicate matches; `None` means pass-through.
    pub fn match_path(&self, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.predicate.matches(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(rules: &RuleSet, path: &str) -> Option<&'static str> {
        rules.match_path(path).map(|rule| rule.name)
    }

    #[test]
    fn test_standard_table_order() {
        let rules = RuleSet::standard(&PipelineConfig::default());
        let names: Vec<_> = rules.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            ["wasm-module", "wasm-asset", "script", "style", "image", "font"]
        );
    }

    #[test]
    fn test_match_path() {
        let rules = RuleSet::standard(&PipelineConfig::default());
        assert_eq!(matched(&rules, "src/app.tsx"), Some("script"));
        assert_eq!(matched(&rules, "src/util.TS"), Some("script"));
        assert_eq!(matched(&rules, "src/theme.scss"), Some("style"));
        assert_eq!(matched(&rules, "assets/logo.svg"), Some("image"));
        assert_eq!(matched(&rules, "assets/font.woff2"), Some("font"));
        assert_eq!(matched(&rules, "src/util.js"), None);
        assert_eq!(matched(&rules, "data/table.json"), None);
    }

    #[test]
    fn test_wasm_rules_are_exclusive() {
        let rules = RuleSet::standard(&PipelineConfig::default());
        for path in [
            "src/flux_parser_bg.wasm",
            "pkg/flux_parser_bg.wasm",
            "src/other.wasm",
        ] {
            let hits: Vec<_> = rules
                .iter()
                .filter(|rule| rule.predicate.matches(path))
                .map(|rule| rule.name)
                .collect();
            assert_eq!(hits.len(), 1, "{path} matched {hits:?}");
        }
        assert_eq!(matched(&rules, "pkg/flux_parser_bg.wasm"), Some("wasm-module"));
        assert_eq!(matched(&rules, "src/other.wasm"), Some("wasm-asset"));
    }

    #[test]
    fn test_binary_module_lookalike_is_pass_through() {
        let rules = RuleSet::standard(&PipelineConfig::default());
        // neither the exact suffix nor a name free of the binary module stem
        assert_eq!(matched(&rules, "src/flux_parser_bg_extra.wasm"), None);
        assert!(
            rules
                .iter()
                .all(|rule| !rule.predicate.matches("src/flux_parser_bg_extra.wasm"))
        );
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::new(vec![
            Rule {
                name: "first",
                predicate: Predicate::suffix([".ts"]),
                chain: Chain::default(),
                emit: EmitAs::InlineModule,
            },
            Rule {
                name: "second",
                predicate: Predicate::suffix([".ts"]),
                chain: Chain::default(),
                emit: EmitAs::CopiedAsset,
            },
        ]);
        assert_eq!(matched(&rules, "a.ts"), Some("first"));
    }

    #[test]
    fn test_script_chain_with_coverage() {
        let mut config = PipelineConfig::default();
        let plain = RuleSet::standard(&config);
        assert_eq!(
            plain.match_path("a.ts").unwrap().chain.to_string(),
            "type-strip{check_types: off, jsx: classic, source_map: on} <- define-constants"
        );

        config.build.coverage = true;
        config.build.source_map = false;
        let covered = RuleSet::standard(&config);
        let names: Vec<_> = covered
            .match_path("a.ts")
            .unwrap()
            .chain
            .steps()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, ["instrument", "type-strip", "define-constants"]);
        assert!(covered.match_path("a.ts").unwrap().chain.to_string().contains("source_map: off"));
    }
}
