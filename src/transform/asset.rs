//! `file-emit`: copy the bytes as a content-addressed asset.

use super::{Content, EmittedFile, Payload, Step, StepContext};
use crate::naming::{ArtifactKind, ArtifactSource};

/// Emits the input as a hashed file; the module exports its public URL.
pub struct FileEmit;

impl Step for FileEmit {
    fn name(&self) -> &'static str {
        "file-emit"
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload> {
        let ext = ctx
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let kind = ArtifactKind::for_extension(&ext);
        let bytes = match input.code {
            Content::Bytes(bytes) => bytes,
            Content::Text(text) => text.into_bytes(),
        };
        let name = ctx.namer.name(&ArtifactSource::Content {
            kind,
            ext: &ext,
            bytes: &bytes,
        })?;

        let code = format!(
            "export default {};\n",
            serde_json::Value::String(name.public.clone())
        );
        let mut emitted = input.emitted;
        emitted.push(EmittedFile { kind, name, bytes });

        Ok(Payload {
            code: Content::Text(code),
            emitted,
            ..Payload::text(String::new())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Defines;
    use crate::transform::testing::with_ctx;
    use std::path::Path;

    #[test]
    fn test_file_emit_exports_public_path() {
        let out = with_ctx(Path::new("/p"), "src/fonts/a.WOFF2", &Defines::default(), |ctx| {
            FileEmit.apply(Payload::bytes(b"wOF2".to_vec()), ctx).unwrap()
        });
        assert_eq!(out.emitted.len(), 1);
        let file = &out.emitted[0];
        assert_eq!(file.kind, ArtifactKind::Font);
        assert_eq!(file.bytes, b"wOF2");
        assert!(file.name.path.ends_with(".woff2"));
        assert_eq!(
            out.code.as_text().unwrap(),
            format!("export default \"{}\";\n", file.name.public)
        );
    }

    #[test]
    fn test_same_bytes_same_name() {
        let emit = |rel: &str| {
            with_ctx(Path::new("/p"), rel, &Defines::default(), |ctx| {
                FileEmit.apply(Payload::bytes(vec![7; 32]), ctx).unwrap()
            })
        };
        let a = emit("src/a/x.png");
        let b = emit("src/b/y.png");
        assert_eq!(a.emitted[0].name, b.emitted[0].name);
    }
}
