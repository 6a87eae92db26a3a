//! `html`: the entry document.
//!
//! The template is read when the stage is constructed, so an unreadable
//! template fails the build before anything else runs. In `emit`, once every
//! other artifact has its final name, the template variables are filled in
//! and the document references the build's artifacts:
//!
//! - `<base href>` right after `<head>`, unless the template has one
//! - favicon, entry stylesheets and `modulepreload` links before `</head>`
//! - entry scripts (`type="module"`) before `</body>`
//!
//! The head/body injection snippets are added at the same places when the
//! template does not reference `{{ header }}` / `{{ body }}` itself.
//!
//! Elements are located on the document parsed with `tl`; production builds
//! then run it through `minify_html`.

mod template;

pub use template::DocumentVars;

use super::{BuildContext, Stage};
use crate::config::{ConfigError, HtmlMinifyConfig, PipelineConfig};
use crate::naming::{ArtifactKind, ArtifactSource};
use crate::utils::html::Tag;
use anyhow::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub struct Html {
    template: String,
    favicon: Option<Favicon>,
    filename: String,
    minify: Option<HtmlMinifyConfig>,
}

struct Favicon {
    file_name: String,
    bytes: Vec<u8>,
}

impl Html {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let template_path = &config.html.template;
        let template = fs::read_to_string(template_path)
            .map_err(|err| ConfigError::Template(template_path.clone(), err))?;

        let favicon = match &config.html.favicon {
            Some(path) => Some(read_favicon(path)?),
            None => None,
        };

        Ok(Self {
            template,
            favicon,
            filename: config.html.filename.clone(),
            minify: config.mode().minify_html.then_some(config.html.minify),
        })
    }

    /// Render the document for the artifacts collected in `ctx`.
    fn render(&self, ctx: &mut BuildContext<'_>) -> Result<String> {
        let vars = DocumentVars::new(ctx.env);
        let mut document = vars.apply(&self.template);

        let mut head = String::new();
        if let Some(favicon) = &self.favicon {
            let name = ctx.namer.name(&ArtifactSource::Verbatim {
                rel_path: &favicon.file_name,
            })?;
            head.push_str(&Tag::new("link").attr("rel", "icon").attr("href", &name.public).render());
            ctx.assets
                .insert(name, ArtifactKind::Image, favicon.bytes.clone())?;
        }
        for style in &ctx.entry_styles {
            head.push_str(
                &Tag::new("link")
                    .attr("rel", "stylesheet")
                    .attr("href", &style.public)
                    .render(),
            );
        }

        let entries: Vec<&str> = ctx
            .graph
            .entry_outputs()
            .into_iter()
            .map(|name| name.public.as_str())
            .collect();
        let unique: BTreeSet<&str> = entries.iter().copied().collect();
        for (_, asset) in ctx.assets.of_kind(ArtifactKind::Script) {
            if !unique.contains(asset.public.as_str()) {
                head.push_str(
                    &Tag::new("link")
                        .attr("rel", "modulepreload")
                        .attr("href", &asset.public)
                        .render(),
                );
            }
        }
        if !template::uses(&self.template, "header") {
            head.push_str(&ctx.env.head_injection);
        }

        let mut body = String::new();
        let mut seen = BTreeSet::new();
        for public in entries {
            if seen.insert(public) {
                body.push_str(
                    &Tag::new("script")
                        .attr("type", "module")
                        .attr("src", public)
                        .render(),
                );
            }
        }
        if !template::uses(&self.template, "body") {
            body.push_str(&ctx.env.body_injection);
        }

        let layout = Layout::of(&document);
        let mut inserts = Vec::with_capacity(3);
        if !layout.has_base {
            let base = Tag::new("base").attr("href", vars.base).render();
            inserts.push((layout.head_open_end, base));
        }
        inserts.push((layout.head_close, head));
        inserts.push((layout.body_close, body));
        // back to front so earlier offsets stay valid; ties keep their order
        inserts.sort_by_key(|(at, _)| *at);
        for (at, content) in inserts.into_iter().rev() {
            document.insert_str(at, &content);
        }

        Ok(match &self.minify {
            Some(opts) => minify(&document, opts),
            None => document,
        })
    }
}

fn read_favicon(path: &Path) -> Result<Favicon, ConfigError> {
    let bytes = fs::read(path).map_err(|err| ConfigError::Favicon(path.to_path_buf(), err))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "favicon.ico".into());
    Ok(Favicon { file_name, bytes })
}

fn minify(document: &str, opts: &HtmlMinifyConfig) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = opts.keep_closing_tags;
    cfg.keep_html_and_head_opening_tags = opts.keep_html_and_head_opening_tags;
    cfg.keep_comments = !opts.remove_comments;
    cfg.minify_css = opts.minify_css;
    cfg.minify_js = opts.minify_js;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    String::from_utf8_lossy(&minify_html::minify(document.as_bytes(), &cfg)).into_owned()
}

/// Insertion points of the parsed template, as byte offsets.
#[derive(Debug, PartialEq, Eq)]
struct Layout {
    has_base: bool,
    /// Right after the `<head ...>` start tag (document start without one).
    head_open_end: usize,
    /// Right before `</head>` (document start without a head).
    head_close: usize,
    /// Right before `</body>` (document end without one).
    body_close: usize,
}

impl Layout {
    fn of(document: &str) -> Self {
        let mut layout = Self {
            has_base: false,
            head_open_end: 0,
            head_close: 0,
            body_close: document.len(),
        };
        let Ok(dom) = tl::parse(document, tl::ParserOptions::default()) else {
            return layout;
        };
        let element = |name: &str| {
            dom.nodes()
                .iter()
                .filter_map(tl::Node::as_tag)
                .find(|tag| tag.name().as_utf8_str().eq_ignore_ascii_case(name))
                .and_then(|tag| Element::locate(document, tag.raw().as_bytes(), name))
        };

        layout.has_base = element("base").is_some();
        if let Some(head) = element("head") {
            layout.head_open_end = head.open_end;
            layout.head_close = head.close_start;
        }
        if let Some(body) = element("body") {
            layout.body_close = body.close_start;
        }
        layout
    }
}

/// Byte range of a parsed element inside its document.
struct Element {
    open_end: usize,
    close_start: usize,
}

impl Element {
    /// `raw` is the element's source slice as borrowed by the parser.
    fn locate(document: &str, raw: &[u8], name: &str) -> Option<Self> {
        let start = (raw.as_ptr() as usize).checked_sub(document.as_ptr() as usize)?;
        if start + raw.len() > document.len() {
            return None;
        }
        let open_end = start + start_tag_len(raw);
        let close_start = raw
            .iter()
            .rposition(|&b| b == b'<')
            .filter(|&i| {
                let rest = &raw[i..];
                rest.len() > name.len() + 2
                    && rest[1] == b'/'
                    && rest[2..2 + name.len()].eq_ignore_ascii_case(name.as_bytes())
            })
            .map_or(start + raw.len(), |i| start + i);
        Some(Self {
            open_end,
            close_start: close_start.max(open_end),
        })
    }
}

/// Length of the start tag at the beginning of `raw`; `>` inside quoted
/// attribute values does not end it.
fn start_tag_len(raw: &[u8]) -> usize {
    let mut quote = None;
    for (i, &b) in raw.iter().enumerate() {
        match (quote, b) {
            (None, b'"' | b'\'') => quote = Some(b),
            (Some(q), _) if q == b => quote = None,
            (None, b'>') => return i + 1,
            _ => {}
        }
    }
    raw.len()
}

impl Stage for Html {
    fn name(&self) -> &'static str {
        "html"
    }

    fn emit(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let document = self.render(ctx)?;
        let name = ctx.namer.name(&ArtifactSource::Document {
            filename: &self.filename,
        })?;
        crate::debug!("html"; "{} ({} bytes)", name.path, document.len());
        ctx.assets
            .insert(name, ArtifactKind::Document, document.into_bytes())?;
        Ok(())
    }
}
