//! `wasm-module`: link a WebAssembly binary as a first-class module.
//!
//! The binary is emitted under its module-identity name and replaced by a
//! wrapper module that imports the binary's import modules, instantiates it
//! with `WebAssembly.instantiateStreaming` and re-exports its exports.

use super::{Content, EmittedFile, Payload, Step, StepContext, export_alias};
use crate::naming::{ArtifactKind, ArtifactSource, ModuleIdentity};
use anyhow::{Result, bail, ensure};
use std::collections::BTreeSet;
use std::fmt::Write;

const MAGIC: &[u8; 4] = b"\0asm";
const VERSION: u32 = 1;

const SECTION_IMPORT: u8 = 2;
const SECTION_EXPORT: u8 = 7;

/// Import modules and export names of a binary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WasmSections {
    /// Modules the binary imports from, in first-seen order, deduplicated.
    pub import_modules: Vec<String>,
    pub exports: Vec<String>,
}

impl WasmSections {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, pos: 0 };
        ensure!(
            reader.take(4)? == MAGIC,
            "not a WebAssembly binary (bad magic)"
        );
        let version = u32::from_le_bytes(reader.array()?);
        ensure!(version == VERSION, "unsupported WebAssembly version {version}");

        let mut sections = Self::default();
        let mut seen_modules = BTreeSet::new();
        while !reader.at_end() {
            let id = reader.byte()?;
            let size = reader.leb_u32()? as usize;
            let body = reader.take(size)?;
            let mut section = Reader { bytes: body, pos: 0 };
            match id {
                SECTION_IMPORT => {
                    for _ in 0..section.leb_u32()? {
                        let module = section.name()?;
                        let _field = section.name()?;
                        section.skip_import_desc()?;
                        if seen_modules.insert(module.clone()) {
                            sections.import_modules.push(module);
                        }
                    }
                }
                SECTION_EXPORT => {
                    for _ in 0..section.leb_u32()? {
                        let name = section.name()?;
                        let _kind = section.byte()?;
                        let _index = section.leb_u32()?;
                        sections.exports.push(name);
                    }
                }
                _ => {}
            }
        }
        Ok(sections)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            bail!("unexpected end of WebAssembly binary at offset {}", self.pos);
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn leb_u64(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.byte()?;
            ensure!(shift < 64, "LEB128 value too long");
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    fn leb_u32(&mut self) -> Result<u32> {
        let value = self.leb_u64()?;
        u32::try_from(value).map_err(|_| anyhow::anyhow!("LEB128 value out of range"))
    }

    fn name(&mut self) -> Result<String> {
        let len = self.leb_u32()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    fn limits(&mut self) -> Result<()> {
        let flags = self.byte()?;
        self.leb_u64()?;
        if flags & 0x01 != 0 {
            self.leb_u64()?;
        }
        Ok(())
    }

    fn skip_import_desc(&mut self) -> Result<()> {
        match self.byte()? {
            // func: type index
            0x00 => {
                self.leb_u32()?;
            }
            // table: reftype + limits
            0x01 => {
                self.byte()?;
                self.limits()?;
            }
            // memory
            0x02 => self.limits()?,
            // global: valtype + mutability
            0x03 => {
                self.byte()?;
                self.byte()?;
            }
            // tag: attribute + type index
            0x04 => {
                self.byte()?;
                self.leb_u32()?;
            }
            other => bail!("unknown import kind {other:#04x}"),
        }
        Ok(())
    }
}

/// Links the configured WebAssembly module.
pub struct WasmModule;

impl WasmModule {
    fn wrapper(sections: &WasmSections, url: &str) -> String {
        let mut code = String::new();
        for (i, module) in sections.import_modules.iter().enumerate() {
            let _ = writeln!(
                code,
                "import * as __wasm_import_{i} from {};",
                serde_json::Value::String(module.clone())
            );
        }
        code.push_str("const __wasm_imports = {");
        for (i, module) in sections.import_modules.iter().enumerate() {
            let _ = write!(
                code,
                " {}: __wasm_import_{i},",
                serde_json::Value::String(module.clone())
            );
        }
        code.push_str(" };\n");
        let _ = writeln!(
            code,
            "const {{ instance }} = await WebAssembly.instantiateStreaming(fetch({}), __wasm_imports);",
            serde_json::Value::String(url.to_string())
        );
        for (i, name) in sections.exports.iter().enumerate() {
            if name == "default" {
                continue;
            }
            let _ = writeln!(
                code,
                "const __wasm_export_{i} = instance.exports[{}];\nexport {{ __wasm_export_{i} as {} }};",
                serde_json::Value::String(name.clone()),
                export_alias(name)
            );
        }
        code.push_str("export default instance.exports;\n");
        code
    }
}

impl Step for WasmModule {
    fn name(&self) -> &'static str {
        "wasm-module"
    }

    fn describe(&self) -> String {
        "instantiate: streaming".into()
    }

    fn apply(&self, input: Payload, ctx: &StepContext<'_>) -> anyhow::Result<Payload> {
        let bytes = match input.code {
            Content::Bytes(bytes) => bytes,
            Content::Text(_) => bail!("expected a binary module"),
        };
        let sections = WasmSections::parse(&bytes)?;
        let identity = ModuleIdentity::new(ctx.rel_path, &sections.import_modules);
        let stem = ctx
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module");
        let name = ctx.namer.name(&ArtifactSource::Module {
            kind: ArtifactKind::BinaryModule,
            name: stem,
            identity: &identity,
        })?;

        let code = Self::wrapper(&sections, &name.public);
        let mut emitted = input.emitted;
        emitted.push(EmittedFile {
            kind: ArtifactKind::BinaryModule,
            name,
            bytes,
        });

        Ok(Payload {
            code: Content::Text(code),
            emitted,
            binary: true,
            ..Payload::text(String::new())
        })
    }
}
