//! Entry document template variables.
//!
//! Templates reference variables as `{{ name }}` (inner whitespace
//! optional). Unknown names are left as written.

use crate::env::EnvProjection;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap()
});

/// Values of the template variables for one build.
#[derive(Debug, Clone, Copy)]
pub struct DocumentVars<'a> {
    pub base: &'a str,
    pub header: &'a str,
    pub body: &'a str,
    pub revision: &'a str,
    pub api_prefix: &'a str,
    pub static_prefix: &'a str,
}

impl<'a> DocumentVars<'a> {
    pub fn new(env: &'a EnvProjection) -> Self {
        Self {
            base: env.html_base(),
            header: &env.head_injection,
            body: &env.body_injection,
            revision: &env.revision,
            api_prefix: &env.api_prefix,
            static_prefix: env.static_prefix(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        match name {
            "base" => Some(self.base),
            "header" => Some(self.header),
            "body" => Some(self.body),
            "revision" => Some(self.revision),
            "api_prefix" => Some(self.api_prefix),
            "static_prefix" => Some(self.static_prefix),
            _ => None,
        }
    }

    pub fn apply(&self, content: &str) -> String {
        VARIABLE
            .replace_all(content, |caps: &Captures<'_>| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => {
                    crate::debug!("html"; "unknown template variable `{}`", &caps[1]);
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

/// Whether `content` references the variable `name`.
pub fn uses(content: &str, name: &str) -> bool {
    VARIABLE.captures_iter(content).any(|caps| &caps[1] == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> DocumentVars<'static> {
        DocumentVars {
            base: "/ui",
            header: "<meta name=\"h\">",
            body: "",
            revision: "abc123",
            api_prefix: "/api/",
            static_prefix: "/ui/",
        }
    }

    #[test]
    fn test_apply() {
        let out = vars().apply("<base href=\"{{base}}\">{{ header }}<i>{{  revision  }}</i>{{ body }}");
        assert_eq!(out, "<base href=\"/ui\"><meta name=\"h\"><i>abc123</i>");
    }

    #[test]
    fn test_unknown_variable_kept() {
        assert_eq!(vars().apply("{{ nope }} {{api_prefix}}"), "{{ nope }} /api/");
    }

    #[test]
    fn test_uses() {
        assert!(uses("<head>{{ header }}</head>", "header"));
        assert!(!uses("<head>{{ headers }}</head>", "header"));
        assert!(!uses("<head></head>", "body"));
    }
}
