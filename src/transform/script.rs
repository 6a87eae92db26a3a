//! Script steps: `type-strip` and `instrument`.

use super::sourcemap::{Edit, compose, locate, splice};
use super::{Content, Payload, Step, StepContext};
use anyhow::{Context, bail};
use oxc::allocator::{Allocator, Vec as ArenaVec};
use oxc::ast::ast::{
    ArrowFunctionExpression, Declaration, ExportDefaultDeclarationKind, Function, FunctionBody,
    Statement,
};
use oxc::ast_visit::{Visit, walk};
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::{GetSpan, SourceType, Span};
use oxc::syntax::scope::ScopeFlags;
use oxc::transformer::{JsxRuntime, TransformOptions, Transformer};
use serde_json::{Map, Value, json};
use std::path::PathBuf;

/// Removes TypeScript syntax and lowers JSX, without type checking.
///
/// Type checking is the job of the background checker; this step only
/// needs the source to parse.
pub struct TypeStrip {
    /// Keep a map from the output back to the source file.
    pub source_map: bool,
}

impl TypeStrip {
    fn options() -> TransformOptions {
        let mut options = TransformOptions::default();
        options.jsx.runtime = JsxRuntime::Classic;
        options
    }
}

impl Step for TypeStrip {
    fn name(&self) -> &'static str {
        "type-strip"
    }

    fn describe(&self) -> String {
        let map = if self.source_map { "on" } else { "off" };
        format!("check_types: off, jsx: classic, source_map: {map}")
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload> {
        let source = input.expect_text()?;
        let source_type = SourceType::from_path(ctx.path)
            .with_context(|| format!("unsupported script extension: {}", ctx.rel_path))?;

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, source_type).parse();
        if let Some(error) = ret.errors.first() {
            bail!("{}", error);
        }
        if ret.panicked {
            bail!("parser gave up");
        }

        let mut program = ret.program;
        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let ret = Transformer::new(&allocator, ctx.path, &Self::options())
            .build_with_scoping(scoping, &mut program);
        if let Some(error) = ret.errors.first() {
            bail!("{}", error);
        }

        let ret = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: self.source_map.then(|| PathBuf::from(ctx.rel_path)),
                ..CodegenOptions::default()
            })
            .build(&program);
        let source_map = match (ret.map, &input.source_map) {
            (Some(map), Some(inner)) => Some(compose(&map, inner)),
            (map, _) => map,
        };
        Ok(Payload {
            code: Content::Text(ret.code),
            source_map,
            ..input
        })
    }
}

/// Name of the module-level coverage record.
const COUNTERS: &str = "__packline_cov";

/// Adds statement and function counters, registered per module on
/// `globalThis.__coverage__` in the istanbul layout.
///
/// Every statement of a statement list counts, except imports, re-exports
/// and function declarations. Statements that are the bare body of an
/// `if` or a loop count with their parent.
pub struct Instrument;

impl Step for Instrument {
    fn name(&self) -> &'static str {
        "instrument"
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload> {
        let source = input.expect_text()?;
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
        if let Some(error) = ret.errors.first() {
            bail!("{}", error);
        }

        let mut counters = Counters::default();
        counters.visit_program(&ret.program);

        let header = counters.header(ctx.rel_path, source, input.source_map.as_ref());
        let mut edits = counters.edits;
        edits.insert(0, Edit::insert(0, header));
        let (code, map) = splice(source, &edits, input.source_map.as_ref(), ctx.rel_path);

        Ok(Payload {
            code: Content::Text(code),
            source_map: input.source_map.is_some().then_some(map),
            ..input
        })
    }
}

#[derive(Default)]
struct Counters {
    statements: Vec<Span>,
    /// Name, declaration span, body span.
    functions: Vec<(String, Span, Span)>,
    edits: Vec<Edit>,
}

impl Counters {
    fn statement(&mut self, span: Span) {
        let id = self.statements.len();
        self.statements.push(span);
        self.edits
            .push(Edit::insert(span.start as usize, format!("{COUNTERS}.s[{id}]++;")));
    }

    fn function(&mut self, name: &str, decl: Span, body: Span) -> usize {
        self.functions.push((name.to_string(), decl, body));
        self.functions.len() - 1
    }

    /// Count a block body on entry, after its directives.
    fn enter_body(&mut self, id: usize, body: &FunctionBody<'_>) {
        let at = body
            .directives
            .last()
            .map_or(body.span.start + 1, |directive| directive.span.end);
        self.edits
            .push(Edit::insert(at as usize, format!("{COUNTERS}.f[{id}]++;")));
    }

    /// Declaration of the counter record, prepended to the module.
    fn header(&self, rel_path: &str, code: &str, map: Option<&oxc_sourcemap::SourceMap>) -> String {
        let spans = self
            .statements
            .iter()
            .chain(self.functions.iter().flat_map(|(_, decl, body)| [decl, body]));
        let offsets: Vec<usize> = spans
            .flat_map(|span| [span.start as usize, span.end as usize])
            .collect();
        let positions = locate(code, map, &offsets);
        let range = |i: usize| {
            let (start, end) = (positions[2 * i], positions[2 * i + 1]);
            json!({
                "start": { "line": start.0 + 1, "column": start.1 },
                "end": { "line": end.0 + 1, "column": end.1 },
            })
        };

        let n = self.statements.len();
        let statement_map: Map<String, Value> =
            (0..n).map(|i| (i.to_string(), range(i))).collect();
        let fn_map: Map<String, Value> = self
            .functions
            .iter()
            .enumerate()
            .map(|(i, (name, _, _))| {
                let decl = range(n + 2 * i);
                let line = decl["start"]["line"].clone();
                let loc = range(n + 2 * i + 1);
                (
                    i.to_string(),
                    json!({ "name": name, "decl": decl, "loc": loc, "line": line }),
                )
            })
            .collect();
        let zeros = |len: usize| -> Map<String, Value> {
            (0..len).map(|i| (i.to_string(), json!(0))).collect()
        };

        let record = json!({
            "path": rel_path,
            "statementMap": statement_map,
            "fnMap": fn_map,
            "branchMap": {},
            "s": zeros(n),
            "f": zeros(self.functions.len()),
            "b": {},
        });
        let key = Value::String(rel_path.to_string());
        format!("const {COUNTERS} = ((globalThis.__coverage__ ||= {{}})[{key}] ||= {record});\n")
    }
}

fn is_counted(statement: &Statement<'_>) -> bool {
    match statement {
        Statement::ImportDeclaration(_)
        | Statement::ExportAllDeclaration(_)
        | Statement::FunctionDeclaration(_)
        | Statement::EmptyStatement(_) => false,
        Statement::ExportNamedDeclaration(export) => !matches!(
            export.declaration,
            None | Some(Declaration::FunctionDeclaration(_))
        ),
        Statement::ExportDefaultDeclaration(export) => !matches!(
            export.declaration,
            ExportDefaultDeclarationKind::FunctionDeclaration(_)
        ),
        _ => true,
    }
}

impl<'a> Visit<'a> for Counters {
    fn visit_statements(&mut self, it: &ArenaVec<'a, Statement<'a>>) {
        for statement in it {
            if is_counted(statement) {
                self.statement(statement.span());
            }
        }
        walk::walk_statements(self, it);
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        if let Some(body) = &it.body {
            let name = it.id.as_ref().map_or("(anonymous)", |id| id.name.as_str());
            let id = self.function(name, it.span, body.span);
            self.enter_body(id, body);
        }
        walk::walk_function(self, it, flags);
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        let id = self.function("(anonymous)", it.span, it.body.span);
        let expression = match it.body.statements.first() {
            Some(Statement::ExpressionStatement(statement)) if it.expression => {
                Some(&statement.expression)
            }
            _ => None,
        };
        let Some(expression) = expression else {
            self.enter_body(id, &it.body);
            walk::walk_arrow_function_expression(self, it);
            return;
        };

        // `() => x` becomes `() => (f++, x)`
        let span = expression.span();
        self.edits.push(Edit::insert(
            span.start as usize,
            format!("({COUNTERS}.f[{id}]++, "),
        ));
        self.visit_formal_parameters(&it.params);
        self.visit_expression(expression);
        self.edits.push(Edit::insert(span.end as usize, ")"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Defines;
    use crate::transform::testing::with_ctx;
    use std::path::Path;

    fn strip(rel: &str, source: &str) -> anyhow::Result<String> {
        with_ctx(Path::new("/p"), rel, &Defines::default(), |ctx| {
            let out = TypeStrip { source_map: false }.apply(Payload::text(source), ctx)?;
            Ok(out.code.as_text().unwrap_or_default().to_string())
        })
    }

    fn instrument(source: &str) -> String {
        with_ctx(Path::new("/p"), "src/app.ts", &Defines::default(), |ctx| {
            let out = Instrument.apply(Payload::text(source), ctx).unwrap();
            out.code.as_text().unwrap().to_string()
        })
    }

    fn parses(code: &str) -> bool {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
        ret.errors.is_empty() && !ret.panicked
    }

    /// The JSON record in the instrumented module's header.
    fn record(code: &str) -> Value {
        let start = code.find("||= {\"").unwrap() + 4;
        let end = code.find(");\n").unwrap();
        serde_json::from_str(&code[start..end]).unwrap()
    }

    #[test]
    fn test_strips_type_annotations() {
        let out = strip(
            "src/util.ts",
            "interface P { x: number }\nexport const add = (a: number, b: number): number => a + b;\n",
        )
        .unwrap();
        assert!(!out.contains("interface"));
        assert!(!out.contains(": number"));
        assert!(out.contains("export const add"));
    }

    #[test]
    fn test_type_errors_do_not_fail() {
        let out = strip("src/bad.ts", "export const n: number = \"not a number\";\n").unwrap();
        assert!(out.contains("\"not a number\""));
    }

    #[test]
    fn test_lowers_jsx() {
        let out = strip(
            "src/app.tsx",
            "import React from \"react\";\nexport const App = () => <div className=\"a\">hi</div>;\n",
        )
        .unwrap();
        assert!(out.contains("React.createElement"));
        assert!(out.contains("from \"react\""));
    }

    #[test]
    fn test_syntax_error_fails() {
        assert!(strip("src/broken.ts", "export const = ;").is_err());
    }

    #[test]
    fn test_type_strip_maps_back_to_the_source() {
        let source = "interface P { x: number }\n\nexport function area(p: P): number {\n  return p.x * p.x;\n}\n";
        let out = with_ctx(Path::new("/p"), "src/area.ts", &Defines::default(), |ctx| {
            TypeStrip { source_map: true }
                .apply(Payload::text(source), ctx)
                .unwrap()
        });
        let code = out.code.as_text().unwrap();
        let map = out.source_map.unwrap();
        assert_eq!(map.get_source(0).map(|s| s.as_ref()), Some("src/area.ts"));
        assert_eq!(map.get_source_content(0).map(|s| s.as_ref()), Some(source));

        // statements are mapped from the start of their printed line
        let at = code[..code.find("return").unwrap()].rfind('\n').unwrap() + 1;
        assert_eq!(locate(code, Some(&map), &[at]), vec![(3, 2)]);
    }

    #[test]
    fn test_type_strip_without_maps() {
        let out = with_ctx(Path::new("/p"), "src/a.ts", &Defines::default(), |ctx| {
            TypeStrip { source_map: false }
                .apply(Payload::text("export const a: number = 1;\n"), ctx)
                .unwrap()
        });
        assert!(out.source_map.is_none());
    }

    #[test]
    fn test_instrument_counts_statements_and_functions() {
        let source = "import { h } from \"./h.js\";\nfunction greet(name) {\n  \"use strict\";\n  const text = h(name);\n  return text;\n}\nconst twice = (x) => x * 2;\nif (twice(1)) greet(\"a\");\nexport { greet };\n";
        let code = instrument(source);
        assert!(parses(&code), "{code}");

        // const, if, plus the two statements inside `greet`
        let record = record(&code);
        assert_eq!(record["path"], "src/app.ts");
        assert_eq!(record["s"].as_object().unwrap().len(), 4);
        assert_eq!(record["f"].as_object().unwrap().len(), 2);
        assert_eq!(record["fnMap"]["0"]["name"], "greet");
        assert_eq!(record["fnMap"]["0"]["decl"]["start"]["line"], 2);
        assert_eq!(record["statementMap"]["0"]["start"]["line"], 7);

        assert!(code.contains("\"use strict\";__packline_cov.f[0]++;"));
        assert!(code.contains("__packline_cov.s[2]++;const text"));
        assert!(code.contains("=> (__packline_cov.f[1]++, x * 2);"));
        assert!(code.contains("__packline_cov.s[1]++;if (twice(1)) greet(\"a\");"));
        assert!(code.contains("\nimport { h }"));
    }

    #[test]
    fn test_instrument_nested_blocks_and_switch() {
        let code = instrument(
            "for (const x of [1]) {\n  switch (x) {\n    case 1:\n      run(x);\n      break;\n  }\n}\nclass A { m() { return 1; } }\n",
        );
        assert!(parses(&code), "{code}");
        let record = record(&code);
        // for, switch, run, break, class, return
        assert_eq!(record["s"].as_object().unwrap().len(), 6);
        assert_eq!(record["fnMap"]["0"]["name"], "(anonymous)");
    }

    #[test]
    fn test_instrument_registers_once_per_module() {
        let code = instrument("run();\n");
        assert!(code.starts_with(
            "const __packline_cov = ((globalThis.__coverage__ ||= {})[\"src/app.ts\"] ||= {"
        ));
        assert!(code.ends_with("__packline_cov.s[0]++;run();\n"));
    }

    #[test]
    fn test_instrument_positions_follow_the_input_map() {
        let source = "\n\nexport const value: number = 1;\n";
        let out = with_ctx(Path::new("/p"), "src/v.ts", &Defines::default(), |ctx| {
            let stripped = TypeStrip { source_map: true }
                .apply(Payload::text(source), ctx)
                .unwrap();
            Instrument.apply(stripped, ctx).unwrap()
        });
        let code = out.code.as_text().unwrap();
        assert_eq!(record(code)["statementMap"]["0"]["start"]["line"], 3);
        assert!(out.source_map.is_some());
    }
}
