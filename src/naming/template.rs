//! Naming templates: `static/[name].[contenthash:10].[ext]`.
//!
//! | Token            | Value                                        |
//! |------------------|----------------------------------------------|
//! | `[name]`         | logical name (entry name or file stem)       |
//! | `[ext]`          | original extension, without the dot          |
//! | `[id]`           | chunk id                                     |
//! | `[contenthash:N]`| first N hex chars of the content's blake3    |
//! | `[hash:N]`       | alias of `contenthash`                       |
//! | `[modulehash:N]` | first N hex chars of the module identity     |

use super::ModuleIdentity;
use thiserror::Error;

/// Hash length when a template omits `:N`.
pub const DEFAULT_HASH_LEN: usize = 20;

/// Longest hash a token can request (blake3 hex length).
const MAX_HASH_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("unclosed `[` in naming template `{0}`")]
    Unclosed(String),

    #[error("unknown token `[{token}]` in naming template `{template}`")]
    UnknownToken { token: String, template: String },

    #[error("invalid hash length in `[{token}]` (expected 1..={MAX_HASH_LEN})")]
    HashLength { token: String },

    #[error("naming template `{template}` needs {what}, which this artifact does not have")]
    Missing { what: &'static str, template: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Name,
    Ext,
    Id,
    ContentHash(usize),
    ModuleHash(usize),
}

/// Everything a template may draw from.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameInput<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub content: Option<&'a [u8]>,
    pub identity: Option<&'a ModuleIdentity>,
    pub id: Option<usize>,
}

/// A parsed naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NameTemplate {
    pub fn parse(source: &str) -> Result<Self, NameError> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find('[') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find(']')
                .ok_or_else(|| NameError::Unclosed(source.to_string()))?;
            segments.push(parse_token(&after[..close], source)?);
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn render(&self, input: &NameInput<'_>) -> Result<String, NameError> {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Name => out.push_str(input.name),
                Segment::Ext => out.push_str(input.ext),
                Segment::Id => {
                    let id = input.id.ok_or_else(|| self.missing("a chunk id"))?;
                    out.push_str(&id.to_string());
                }
                Segment::ContentHash(len) => {
                    let content = input.content.ok_or_else(|| self.missing("content"))?;
                    out.push_str(&super::content_hash(content)[..*len]);
                }
                Segment::ModuleHash(len) => {
                    let identity = input
                        .identity
                        .ok_or_else(|| self.missing("a module identity"))?;
                    out.push_str(&identity.to_hex()[..*len]);
                }
            }
        }
        Ok(out)
    }

    fn missing(&self, what: &'static str) -> NameError {
        NameError::Missing {
            what,
            template: self.source.clone(),
        }
    }
}

fn parse_token(token: &str, template: &str) -> Result<Segment, NameError> {
    let (kind, len) = match token.split_once(':') {
        Some((kind, len)) => {
            let len: usize = len.parse().map_err(|_| NameError::HashLength {
                token: token.to_string(),
            })?;
            if len == 0 || len > MAX_HASH_LEN {
                return Err(NameError::HashLength {
                    token: token.to_string(),
                });
            }
            (kind, Some(len))
        }
        None => (token, None),
    };

    let hash_len = len.unwrap_or(DEFAULT_HASH_LEN);
    match (kind, len) {
        ("name", None) => Ok(Segment::Name),
        ("ext", None) => Ok(Segment::Ext),
        ("id", None) => Ok(Segment::Id),
        ("contenthash" | "hash", _) => Ok(Segment::ContentHash(hash_len)),
        ("modulehash", _) => Ok(Segment::ModuleHash(hash_len)),
        _ => Err(NameError::UnknownToken {
            token: token.to_string(),
            template: template.to_string(),
        }),
    }
}
