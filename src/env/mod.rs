//! Environment projection.
//!
//! The ambient process environment is read exactly once, in `main`, into a
//! [`RawEnv`]. [`EnvProjection::project`] turns it into the frozen view every
//! other component receives: the revision, the deployment prefixes, the
//! HTML injection snippets and the constants substituted into scripts.
//!
//! | Variable        | Projection                                   |
//! |-----------------|----------------------------------------------|
//! | `GIT_SHA`       | revision (falls back to the repo's `HEAD`)   |
//! | `STATIC_PREFIX` | base path, normalized to `/…/`               |
//! | `API_PREFIX`    | API prefix, normalized to `/…/`              |
//! | `INJECT_HEADER` | head injection snippet (default empty)       |
//! | `INJECT_BODY`   | body injection snippet (default empty)       |

use std::collections::BTreeMap;
use std::path::Path;

/// Snapshot of the process environment.
pub type RawEnv = BTreeMap<String, String>;

/// Revision used when neither `GIT_SHA` nor a git repository is available.
pub const UNKNOWN_REVISION: &str = "unknown";

/// Capture the process environment. Only `main` calls this.
pub fn capture() -> RawEnv {
    std::env::vars().collect()
}

/// Frozen projection of the ambient configuration for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvProjection {
    pub revision: String,
    /// Directory of hashed assets inside the output (e.g. `static/`).
    pub static_dir: String,
    /// Public path the application is served under (e.g. `/` or `/ui/`).
    pub base_path: String,
    pub api_prefix: String,
    pub head_injection: String,
    pub body_injection: String,
    vars: RawEnv,
}

impl EnvProjection {
    /// Project the raw environment.
    pub fn project(raw: &RawEnv, root: &Path, static_dir: &str) -> Self {
        let revision = raw
            .get("GIT_SHA")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| head_revision(root));

        Self {
            revision,
            static_dir: static_dir.to_string(),
            base_path: format_base_path(raw.get("STATIC_PREFIX").map(String::as_str)),
            api_prefix: format_base_path(raw.get("API_PREFIX").map(String::as_str)),
            head_injection: raw.get("INJECT_HEADER").cloned().unwrap_or_default(),
            body_injection: raw.get("INJECT_BODY").cloned().unwrap_or_default(),
            vars: raw.clone(),
        }
    }

    /// Prefix the application is served under, exposed as `STATIC_PREFIX`.
    pub fn static_prefix(&self) -> &str {
        &self.base_path
    }

    /// Base path without its trailing slash, for `<base href>`.
    ///
    /// The root path stays `/`.
    pub fn html_base(&self) -> &str {
        let trimmed = self.base_path.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }
    }

    /// Compile-time constants: every ambient variable, overridden by the
    /// projected `GIT_SHA`, `API_PREFIX` and `STATIC_PREFIX`.
    pub fn constants(&self) -> Defines {
        let mut values: BTreeMap<String, String> = self.vars.clone();
        values.insert("GIT_SHA".into(), self.revision.clone());
        values.insert("API_PREFIX".into(), self.api_prefix.clone());
        values.insert("STATIC_PREFIX".into(), self.base_path.clone());
        Defines::from_values(values)
    }
}

/// Normalize a path prefix to a leading and trailing `/`.
///
/// `None`, `""` and `"/"` all become `/`.
pub fn format_base_path(raw: Option<&str>) -> String {
    let trimmed = raw.unwrap_or_default().trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// `HEAD` commit of the repository containing `root`.
fn head_revision(root: &Path) -> String {
    match gix::discover(root) {
        Ok(repo) => match repo.head_id() {
            Ok(id) => id.to_string(),
            Err(e) => {
                crate::debug!("env"; "no HEAD commit: {}", e);
                UNKNOWN_REVISION.to_string()
            }
        },
        Err(e) => {
            crate::debug!("env"; "not a git repository: {}", e);
            UNKNOWN_REVISION.to_string()
        }
    }
}

// ============================================================================
// Defines
// ============================================================================

/// Constant name → JavaScript literal substituted for `process.env.NAME`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defines {
    literals: BTreeMap<String, String>,
}

impl Defines {
    /// Build from raw string values, encoding each as a JSON string literal.
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        let literals = values
            .into_iter()
            .map(|(name, value)| {
                let literal = serde_json::Value::String(value).to_string();
                (name, literal)
            })
            .collect();
        Self { literals }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.literals.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawEnv {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_format_base_path() {
        assert_eq!(format_base_path(None), "/");
        assert_eq!(format_base_path(Some("")), "/");
        assert_eq!(format_base_path(Some("/")), "/");
        assert_eq!(format_base_path(Some("ui")), "/ui/");
        assert_eq!(format_base_path(Some("/ui")), "/ui/");
        assert_eq!(format_base_path(Some("/a/b/")), "/a/b/");
    }

    #[test]
    fn test_project_defaults() {
        let env = EnvProjection::project(&raw(&[("GIT_SHA", "abc123")]), Path::new("/"), "static/");
        assert_eq!(env.revision, "abc123");
        assert_eq!(env.base_path, "/");
        assert_eq!(env.api_prefix, "/");
        assert_eq!(env.head_injection, "");
        assert_eq!(env.body_injection, "");
        assert_eq!(env.html_base(), "/");
    }

    #[test]
    fn test_project_overrides() {
        let env = EnvProjection::project(
            &raw(&[
                ("GIT_SHA", "deadbeef"),
                ("STATIC_PREFIX", "/ui"),
                ("API_PREFIX", "api"),
                ("INJECT_HEADER", "<meta name=\"x\">"),
                ("INJECT_BODY", "<script>1</script>"),
            ]),
            Path::new("/"),
            "static/",
        );
        assert_eq!(env.base_path, "/ui/");
        assert_eq!(env.static_prefix(), "/ui/");
        assert_eq!(env.api_prefix, "/api/");
        assert_eq!(env.html_base(), "/ui");
        assert_eq!(env.head_injection, "<meta name=\"x\">");
    }

    #[test]
    fn test_revision_falls_back_without_repo() {
        let dir = tempfile::TempDir::new().unwrap();
        let env = EnvProjection::project(&RawEnv::new(), dir.path(), "static/");
        assert!(!env.revision.is_empty());
    }

    #[test]
    fn test_constants_override_ambient() {
        let env = EnvProjection::project(
            &raw(&[
                ("GIT_SHA", "abc"),
                ("STATIC_PREFIX", "ui"),
                ("NODE_ENV", "production"),
            ]),
            Path::new("/"),
            "static/",
        );
        let defines = env.constants();
        assert_eq!(defines.get("GIT_SHA"), Some("\"abc\""));
        assert_eq!(defines.get("STATIC_PREFIX"), Some("\"/ui/\""));
        assert_eq!(defines.get("API_PREFIX"), Some("\"/\""));
        assert_eq!(defines.get("NODE_ENV"), Some("\"production\""));
        assert_eq!(defines.get("MISSING"), None);
    }

    #[test]
    fn test_defines_escape_values() {
        let defines = Defines::from_values(BTreeMap::from([(
            "QUOTE".to_string(),
            "a\"b\\c".to_string(),
        )]));
        assert_eq!(defines.get("QUOTE"), Some(r#""a\"b\\c""#));
    }
}
