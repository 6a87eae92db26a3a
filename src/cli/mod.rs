//! Command-line interface module.

mod args;
pub mod build;
pub mod rules;

pub use args::{BuildArgs, Cli, Commands};
