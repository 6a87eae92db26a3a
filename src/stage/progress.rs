//! `progress`: human-readable progress of the build.

use super::{BuildContext, Stage};
use crate::log;
use crate::logger::ProgressLine;
use crate::utils::plural::plural_count;
use anyhow::Result;
use std::time::Instant;

#[derive(Default)]
pub struct Progress {
    started: Option<Instant>,
}

impl Stage for Progress {
    fn name(&self) -> &'static str {
        "progress"
    }

    fn setup(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        self.started = Some(Instant::now());
        let entries: Vec<&str> = ctx.config.build.entry.keys().map(String::as_str).collect();
        log!(
            "build";
            "{} into {}",
            entries.join(", "),
            ctx.config.root_relative(&ctx.config.build.output)
        );
        ctx.progress = Some(ProgressLine::new(&["modules"]));
        Ok(())
    }

    fn emit(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        if let Some(progress) = ctx.progress.take() {
            progress.finish();
        }
        crate::debug!("build"; "{} assets ready", ctx.assets.len());
        Ok(())
    }

    fn done(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
        log!(
            "build";
            "{} in {:.2}s",
            plural_count(ctx.graph.len(), "module"),
            elapsed.as_secs_f64()
        );
        Ok(())
    }
}
