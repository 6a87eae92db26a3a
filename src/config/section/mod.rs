//! Configuration section definitions for `packline.toml`.

mod build;
mod html;
mod output;
mod resolve;
mod stats;
mod typecheck;

pub use build::{BuildSectionConfig, CleanConfig, RulesConfig};
pub use html::{HtmlConfig, HtmlMinifyConfig};
pub use output::{OutputConfig, STATIC_PLACEHOLDER};
pub use resolve::ResolveConfig;
pub use stats::{StatsConfig, validate_patterns};
pub use typecheck::TypecheckConfig;
