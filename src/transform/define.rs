//! `define-constants`: compile-time substitution of `process.env.NAME`.
//!
//! References are found on the parsed module, so comments, strings and
//! template text are never touched, and a local binding named `process`
//! shadows the global one.

use super::sourcemap::{Edit, splice};
use super::{Content, Payload, Step, StepContext};
use anyhow::{Context, bail};
use oxc::allocator::Allocator;
use oxc::ast::ast::{Expression, IdentifierReference, MemberExpression};
use oxc::ast_visit::{Visit, walk};
use oxc::parser::Parser;
use oxc::semantic::{Scoping, SemanticBuilder};
use oxc::span::{GetSpan, SourceType};

/// Replaces environment references with JSON literals.
pub struct DefineConstants;

impl Step for DefineConstants {
    fn name(&self) -> &'static str {
        "define-constants"
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload> {
        let source = input.expect_text()?;
        if !source.contains("process") {
            return Ok(input);
        }
        let source_type = SourceType::from_path(ctx.path)
            .with_context(|| format!("unsupported script extension: {}", ctx.rel_path))?;

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, source_type).parse();
        if let Some(error) = ret.errors.first() {
            bail!("{}", error);
        }
        let scoping = SemanticBuilder::new()
            .build(&ret.program)
            .semantic
            .into_scoping();

        let mut refs = EnvRefs {
            scoping: &scoping,
            found: Vec::new(),
        };
        refs.visit_program(&ret.program);
        if refs.found.is_empty() {
            return Ok(input);
        }

        let mut edits = Vec::with_capacity(refs.found.len());
        for (span, name) in refs.found {
            let Some(literal) = ctx.defines.get(&name) else {
                bail!("`process.env.{name}` is not defined");
            };
            edits.push(Edit::replace(span.start as usize..span.end as usize, literal));
        }
        let (code, map) = splice(source, &edits, input.source_map.as_ref(), ctx.rel_path);

        Ok(Payload {
            code: Content::Text(code),
            source_map: Some(map),
            ..input
        })
    }
}

/// Collects `process.env.NAME` and `process.env["NAME"]` reads.
struct EnvRefs<'s> {
    scoping: &'s Scoping,
    found: Vec<(oxc::span::Span, String)>,
}

impl EnvRefs<'_> {
    /// `object` is `process.env` on the global `process`.
    fn is_process_env(&self, object: &Expression<'_>) -> bool {
        let Expression::StaticMemberExpression(member) = object else {
            return false;
        };
        member.property.name.as_str() == "env"
            && matches!(
                &member.object,
                Expression::Identifier(ident)
                    if ident.name.as_str() == "process" && self.is_global(ident)
            )
    }

    fn is_global(&self, ident: &IdentifierReference<'_>) -> bool {
        ident
            .reference_id
            .get()
            .is_none_or(|id| self.scoping.get_reference(id).symbol_id().is_none())
    }
}

impl<'a> Visit<'a> for EnvRefs<'_> {
    fn visit_member_expression(&mut self, it: &MemberExpression<'a>) {
        let name = match it {
            MemberExpression::StaticMemberExpression(member)
                if self.is_process_env(&member.object) =>
            {
                Some(member.property.name.as_str())
            }
            MemberExpression::ComputedMemberExpression(member)
                if self.is_process_env(&member.object) =>
            {
                match &member.expression {
                    Expression::StringLiteral(literal) => Some(literal.value.as_str()),
                    _ => None,
                }
            }
            _ => None,
        };
        match name {
            Some(name) => self.found.push((it.span(), name.to_string())),
            None => walk::walk_member_expression(self, it),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Defines;
    use crate::transform::testing::with_ctx;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn defines() -> Defines {
        Defines::from_values(BTreeMap::from([
            ("GIT_SHA".to_string(), "abc123".to_string()),
            ("API_PREFIX".to_string(), "/api/".to_string()),
        ]))
    }

    fn run(source: &str) -> anyhow::Result<String> {
        with_ctx(Path::new("/p"), "src/app.ts", &defines(), |ctx| {
            let out = DefineConstants.apply(Payload::text(source), ctx)?;
            Ok(out.code.as_text().unwrap_or_default().to_string())
        })
    }

    #[test]
    fn test_substitutes_known_constants() {
        let out = run("const v = process.env.GIT_SHA; fetch(process.env['API_PREFIX'] + 'x');")
            .unwrap();
        assert_eq!(out, r#"const v = "abc123"; fetch("/api/" + 'x');"#);
    }

    #[test]
    fn test_undefined_constant_is_an_error() {
        let err = run("console.log(process.env.NOPE)").unwrap_err();
        assert!(err.to_string().contains("process.env.NOPE"));
    }

    #[test]
    fn test_comments_are_not_references() {
        let source = "// set process.env.FEATURE_FLAG_UNSET to enable\n/* process.env.NOPE */\nrun();\n";
        assert_eq!(run(source).unwrap(), source);
    }

    #[test]
    fn test_strings_and_templates_are_not_references() {
        let source = "const help = \"read process.env.GIT_SHA for the revision\";\nconst t = `process.env.NOPE ${process.env.GIT_SHA}`;\n";
        let out = run(source).unwrap();
        assert_eq!(
            out,
            "const help = \"read process.env.GIT_SHA for the revision\";\nconst t = `process.env.NOPE ${\"abc123\"}`;\n"
        );
    }

    #[test]
    fn test_local_process_binding_is_left_alone() {
        let source = "function f(process: any) { return process.env.NOPE; }\nexport const v = process.env.GIT_SHA;\n";
        let out = run(source).unwrap();
        assert!(out.contains("return process.env.NOPE;"));
        assert!(out.contains("export const v = \"abc123\";"));
    }

    #[test]
    fn test_typescript_syntax_around_references() {
        let out = run("const v: string = process.env.GIT_SHA as string;\n").unwrap();
        assert_eq!(out, "const v: string = \"abc123\" as string;\n");
    }

    #[test]
    fn test_substitution_keeps_a_map_to_the_source() {
        let source = "const v = process.env.GIT_SHA;\nrun(v);\n";
        let out = with_ctx(Path::new("/p"), "src/app.ts", &defines(), |ctx| {
            DefineConstants.apply(Payload::text(source), ctx).unwrap()
        });
        let map = out.source_map.unwrap();
        assert_eq!(map.get_source(0).map(|s| s.as_ref()), Some("src/app.ts"));
        assert_eq!(map.get_source_content(0).map(|s| s.as_ref()), Some(source));
    }

    #[test]
    fn test_source_without_references_is_untouched() {
        assert_eq!(run("let env = 1;").unwrap(), "let env = 1;");
        let out = with_ctx(Path::new("/p"), "src/app.ts", &defines(), |ctx| {
            DefineConstants.apply(Payload::text("let process = 1;"), ctx).unwrap()
        });
        assert!(out.source_map.is_none());
    }

    #[test]
    fn test_rejects_binary_input() {
        let result = with_ctx(Path::new("/p"), "a.ts", &defines(), |ctx| {
            DefineConstants.apply(
                Payload {
                    code: Content::Bytes(vec![0]),
                    ..Payload::text("")
                },
                ctx,
            )
        });
        assert!(result.is_err());
    }
}
