//! Core types - pure abstractions shared across the codebase.

mod driver;
mod state;

pub use driver::BuildMode;
pub use state::{is_shutdown, setup_shutdown_handler};
