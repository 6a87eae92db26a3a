//! Path predicates of the rule table.

use std::fmt;

/// Decides whether a rule applies to a path.
///
/// Comparisons are ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The path ends with any of the suffixes.
    Suffix(Vec<String>),
    /// The path ends with `suffix` and its file name does not contain `except`.
    SuffixExcept { suffix: String, except: String },
}

impl Predicate {
    pub fn suffix<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Suffix(suffixes.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Suffix(suffixes) => suffixes.iter().any(|s| ends_with_ignore_case(path, s)),
            Self::SuffixExcept { suffix, except } => {
                ends_with_ignore_case(path, suffix)
                    && !contains_ignore_case(file_name(path), except)
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suffix(suffixes) => write!(f, "*{{{}}}", suffixes.join(",")),
            Self::SuffixExcept { suffix, except } => write!(f, "*{suffix} !{except}"),
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn ends_with_ignore_case(haystack: &str, suffix: &str) -> bool {
    haystack.len() >= suffix.len()
        && haystack.as_bytes()[haystack.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty()
        || haystack
            .as_bytes()
            .windows(needle.len())
            .any(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}
