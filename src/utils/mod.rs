//! Utility modules shared by the pipeline.

pub mod exec;
pub mod html;
pub mod path;
pub mod plural;
