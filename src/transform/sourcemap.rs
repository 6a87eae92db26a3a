//! Source maps of emitted scripts.
//!
//! A script's map always points back at its original source file. Steps
//! that reprint the code compose their codegen map onto it with
//! [`compose`]; steps that splice text move it along with [`splice`].
//! Columns are UTF-16 code units, as in the source map format.

use oxc_sourcemap::{SourceMap, SourceMapBuilder};
use std::ops::Range;

/// Replacement of a byte range of generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }

    pub fn remove(range: Range<usize>) -> Self {
        Self::replace(range, String::new())
    }
}

/// Edits sorted by position; an edit overlapping an earlier one is dropped.
fn ordered(edits: &[Edit]) -> Vec<&Edit> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|edit| (edit.range.start, edit.range.end));
    let mut last = 0;
    sorted.retain(|edit| {
        let keep = edit.range.start >= last;
        if keep {
            last = edit.range.end;
        }
        keep
    });
    sorted
}

/// Apply `edits` to `code`. `edits` may be unsorted.
pub fn apply(code: &str, edits: &[Edit]) -> String {
    splice_text(code, &ordered(edits)).0
}

/// Output text plus `(old_start, old_end, new_end)` per applied edit.
fn splice_text(code: &str, edits: &[&Edit]) -> (String, Vec<(usize, usize, usize)>) {
    let mut out = String::with_capacity(code.len());
    let mut moved = Vec::with_capacity(edits.len());
    let mut last = 0;
    for edit in edits {
        out.push_str(&code[last..edit.range.start]);
        out.push_str(&edit.text);
        moved.push((edit.range.start, edit.range.end, out.len()));
        last = edit.range.end;
    }
    out.push_str(&code[last..]);
    (out, moved)
}

/// Apply `edits` to `code` and return a map of the result.
///
/// `map` describes `code`; without one, `code` is taken to be the original
/// source named `source`. Inserted text is unmapped; text after a
/// replacement keeps pointing at its original position.
pub fn splice(
    code: &str,
    edits: &[Edit],
    map: Option<&SourceMap>,
    source: &str,
) -> (String, SourceMap) {
    let edits = ordered(edits);
    let (out, moved) = splice_text(code, &edits);
    let translate = |old: usize| -> usize {
        let i = moved.partition_point(|&(start, _, _)| start <= old);
        let Some(&(_, end, new_end)) = i.checked_sub(1).and_then(|i| moved.get(i)) else {
            return old;
        };
        if old < end {
            // inside replaced text: where the replacement starts
            new_end - edits[i - 1].text.len()
        } else {
            old - end + new_end
        }
    };

    let mut builder = SourceMapBuilder::default();
    let mut from = Lines::new(code);
    let mut to = Lines::new(&out);

    match map {
        Some(map) => {
            let sources = copy_sources(map, &mut builder);
            let names: Vec<u32> = map.get_names().map(|name| builder.add_name(name)).collect();
            for token in map.get_tokens() {
                let Some(old) = from.offset(token.get_dst_line(), token.get_dst_col()) else {
                    continue;
                };
                let (line, col) = to.position(translate(old));
                builder.add_token(
                    line,
                    col,
                    token.get_src_line(),
                    token.get_src_col(),
                    token.get_source_id().and_then(|id| sources.get(id as usize).copied()),
                    token.get_name_id().and_then(|id| names.get(id as usize).copied()),
                );
            }
        }
        None => {
            let id = builder.add_source_and_content(source, code);
            // one anchor per line start and after every edit
            let mut anchors: Vec<usize> = from.starts.clone();
            anchors.extend(edits.iter().map(|edit| edit.range.end));
            anchors.sort_unstable();
            anchors.dedup();
            for old in anchors {
                let (src_line, src_col) = from.position(old);
                let (line, col) = to.position(translate(old));
                builder.add_token(line, col, src_line, src_col, Some(id), None);
            }
        }
    }
    (out, builder.into_sourcemap())
}

/// Map from the code `outer` was generated for straight to the sources of
/// `inner`, which describes that code.
pub fn compose(outer: &SourceMap, inner: &SourceMap) -> SourceMap {
    let mut builder = SourceMapBuilder::default();
    let sources = copy_sources(inner, &mut builder);
    let names: Vec<u32> = inner.get_names().map(|name| builder.add_name(name)).collect();
    let table = inner.generate_lookup_table();

    for token in outer.get_tokens() {
        if token.get_source_id().is_none() {
            continue;
        }
        let (line, col) = (token.get_src_line(), token.get_src_col());
        let Some(origin) = inner.lookup_token(&table, line, col) else {
            continue;
        };
        let Some(source) = origin.get_source_id().and_then(|id| sources.get(id as usize)) else {
            continue;
        };
        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            origin.get_src_line(),
            origin.get_src_col() + (col - origin.get_dst_col()),
            Some(*source),
            origin.get_name_id().and_then(|id| names.get(id as usize).copied()),
        );
    }
    builder.into_sourcemap()
}

/// `(line, column)` in the original source of each byte offset of `code`,
/// both 0-based. Without `map`, `code` is the original source.
pub fn locate(code: &str, map: Option<&SourceMap>, offsets: &[usize]) -> Vec<(u32, u32)> {
    let mut lines = Lines::new(code);
    let table = map.map(SourceMap::generate_lookup_table);
    offsets
        .iter()
        .map(|&offset| {
            let (line, col) = lines.position(offset);
            let (Some(map), Some(table)) = (map, &table) else {
                return (line, col);
            };
            match map.lookup_token(table, line, col) {
                Some(token) if token.get_source_id().is_some() => (
                    token.get_src_line(),
                    token.get_src_col() + (col - token.get_dst_col()),
                ),
                _ => (line, col),
            }
        })
        .collect()
}

/// Add the sources of `map` to `builder`; returns the new id of each.
fn copy_sources(map: &SourceMap, builder: &mut SourceMapBuilder) -> Vec<u32> {
    map.get_sources()
        .zip(map.get_source_contents())
        .map(|(source, content)| {
            builder.add_source_and_content(source, content.map_or("", |c| c.as_ref()))
        })
        .collect()
}

/// Converts between byte offsets and `(line, UTF-16 column)` positions.
///
/// Lookups are fastest when made in increasing order.
struct Lines<'a> {
    text: &'a str,
    starts: Vec<usize>,
    /// Last resolved `(offset, line, column)`.
    cursor: (usize, u32, u32),
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            text,
            starts,
            cursor: (0, 0, 0),
        }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset).saturating_sub(1)
    }

    fn position(&mut self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let (mut at, mut col) = match self.cursor {
            (at, cursor_line, col) if cursor_line as usize == line && at <= offset => (at, col),
            _ => (self.starts[line], 0),
        };
        for ch in self.text[at..].chars() {
            if at >= offset {
                break;
            }
            at += ch.len_utf8();
            col += ch.len_utf16() as u32;
        }
        self.cursor = (at, line as u32, col);
        (line as u32, col)
    }

    fn offset(&mut self, line: u32, col: u32) -> Option<usize> {
        let start = *self.starts.get(line as usize)?;
        let (mut at, mut current) = match self.cursor {
            (at, cursor_line, current) if cursor_line == line && current <= col => (at, current),
            _ => (start, 0),
        };
        for ch in self.text[at..].chars() {
            if current >= col || ch == '\n' {
                break;
            }
            at += ch.len_utf8();
            current += ch.len_utf16() as u32;
        }
        self.cursor = (at, line, current);
        Some(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Original `(line, column)` of the generated position of `needle`.
    fn origin_of(map: &SourceMap, code: &str, needle: &str) -> Option<(u32, u32)> {
        let offset = code.find(needle)?;
        let mut lines = Lines::new(code);
        let (line, col) = lines.position(offset);
        let table = map.generate_lookup_table();
        let token = map.lookup_token(&table, line, col)?;
        Some((token.get_src_line(), token.get_src_col() + (col - token.get_dst_col())))
    }

    #[test]
    fn test_apply_sorts_and_skips_overlaps() {
        let code = "import a from \"./a\";\nimport b from \"./b\";\n";
        let out = apply(
            code,
            &[
                Edit::replace(35..40, "\"/static/b.js\""),
                Edit::replace(14..19, "\"/static/a.js\""),
                Edit::replace(15..17, "ignored"),
                Edit::insert(0, "/*x*/"),
            ],
        );
        assert_eq!(
            out,
            "/*x*/import a from \"/static/a.js\";\nimport b from \"/static/b.js\";\n"
        );
    }

    #[test]
    fn test_splice_identity_tracks_moved_text() {
        let code = "const v = process.env.SHA;\nrun(v, \"é\");\n";
        let start = code.find("process").unwrap();
        let end = start + "process.env.SHA".len();
        let (out, map) = splice(
            code,
            &[Edit::replace(start..end, "\"abc\""), Edit::insert(0, "pre();\n")],
            None,
            "src/app.ts",
        );
        assert_eq!(out, "pre();\nconst v = \"abc\";\nrun(v, \"é\");\n");
        assert_eq!(map.get_source(0).map(|s| s.as_ref()), Some("src/app.ts"));
        assert_eq!(map.get_source_content(0).map(|s| s.as_ref()), Some(code));

        assert_eq!(origin_of(&map, &out, "const"), Some((0, 0)));
        assert_eq!(origin_of(&map, &out, ";\nrun"), Some((0, 25)));
        assert_eq!(origin_of(&map, &out, "v, "), Some((1, 4)));
    }

    #[test]
    fn test_splice_then_compose_reaches_the_original() {
        let code = "let a = 1;\nlet b = 2;\n";
        let (first, first_map) = splice(code, &[Edit::insert(0, "// one\n")], None, "a.ts");
        let (second, second_map) = splice(
            &first,
            &[Edit::insert(0, "// two\n")],
            Some(&first_map),
            "unused",
        );
        assert_eq!(second, "// two\n// one\nlet a = 1;\nlet b = 2;\n");
        assert_eq!(second_map.get_source(0).map(|s| s.as_ref()), Some("a.ts"));
        assert_eq!(origin_of(&second_map, &second, "let b"), Some((1, 0)));

        // an outer map onto `second` that only shifts lines by one
        let mut builder = SourceMapBuilder::default();
        let id = builder.add_source_and_content("second.js", &second);
        builder.add_token(0, 0, 3, 0, Some(id), None);
        builder.add_token(0, 4, 3, 4, Some(id), None);
        let outer = builder.into_sourcemap();
        let composed = compose(&outer, &second_map);
        let token = composed.get_tokens().nth(1).unwrap();
        assert_eq!((token.get_src_line(), token.get_src_col()), (1, 4));
        assert_eq!(composed.get_source(0).map(|s| s.as_ref()), Some("a.ts"));
    }

    #[test]
    fn test_locate_through_a_map() {
        let code = "let a = 1;\nlet b = 2;\n";
        let (out, map) = splice(code, &[Edit::insert(0, "// header\n")], None, "a.ts");
        let b = out.find("let b").unwrap();
        assert_eq!(locate(&out, Some(&map), &[b, b + 4]), vec![(1, 0), (1, 4)]);
        assert_eq!(locate(&out, None, &[b]), vec![(2, 0)]);
    }

    #[test]
    fn test_lines_utf16_columns() {
        let text = "aé😀b\nc";
        let mut lines = Lines::new(text);
        let b = text.find('b').unwrap();
        assert_eq!(lines.position(b), (0, 4));
        assert_eq!(lines.offset(0, 4), Some(b));
        assert_eq!(lines.offset(1, 0), Some(text.len() - 1));
        assert_eq!(lines.offset(2, 0), None);
    }
}
