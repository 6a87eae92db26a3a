//! Import specifier scanning.
//!
//! Works on emitted ES module text through oxc's module record: static
//! `import`/`export … from` declarations and `import()` calls whose
//! argument is a string literal or a template without substitutions.

use anyhow::{Result, bail};
use oxc::allocator::Allocator;
use oxc::parser::Parser;
use oxc::span::{SourceType, Span};
use oxc::syntax::module_record::{ExportImportName, ImportImportName};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportKind {
    Static,
    Dynamic,
}

/// One import found in module text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    pub kind: ImportKind,
    /// Named bindings requested (`{ a, b as c }` gives `a`, `b`).
    pub names: Vec<String>,
    /// Byte range of the specifier literal, quotes included.
    pub span: Range<usize>,
    /// Byte range of the whole declaration, or of the `import()` call.
    pub statement: Range<usize>,
    /// `import "x";`, which takes no binding from the module.
    pub bare: bool,
}

fn range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

/// Find all imports in `code`, in source order.
pub fn scan(code: &str) -> Result<Vec<ImportRef>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if let Some(error) = ret.errors.first() {
        bail!("{}", error);
    }
    let record = &ret.module_record;
    let mut imports = Vec::new();

    for (specifier, requests) in record.requested_modules.iter() {
        for request in requests.iter().filter(|request| !request.is_type) {
            let statement = request.statement_span;
            let mut names = Vec::new();
            let mut bindings = 0;
            for entry in record
                .import_entries
                .iter()
                .filter(|entry| entry.statement_span == statement && !entry.is_type)
            {
                bindings += 1;
                if let ImportImportName::Name(name) = &entry.import_name {
                    names.push(name.name.to_string());
                }
            }
            for entry in record
                .indirect_export_entries
                .iter()
                .filter(|entry| entry.statement_span == statement && !entry.is_type)
            {
                if let ExportImportName::Name(name) = &entry.import_name {
                    names.push(name.name.to_string());
                }
            }
            imports.push(ImportRef {
                specifier: specifier.to_string(),
                kind: ImportKind::Static,
                names,
                span: range(request.span),
                statement: range(statement),
                bare: request.is_import && bindings == 0,
            });
        }
    }

    for dynamic in &record.dynamic_imports {
        let argument = range(dynamic.module_request);
        let Some(specifier) = literal_value(&code[argument.clone()]) else {
            continue;
        };
        imports.push(ImportRef {
            specifier: specifier.to_string(),
            kind: ImportKind::Dynamic,
            names: Vec::new(),
            span: argument,
            statement: range(dynamic.span),
            bare: false,
        });
    }

    imports.sort_by_key(|import| import.span.start);
    Ok(imports)
}

/// Value of a quoted literal without escapes or substitutions.
fn literal_value(text: &str) -> Option<&str> {
    let quote = text.chars().next()?;
    if !matches!(quote, '"' | '\'' | '`') || text.len() < 2 || !text.ends_with(quote) {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    if inner.contains('\\') || inner.contains(quote) || (quote == '`' && inner.contains("${")) {
        return None;
    }
    Some(inner)
}
