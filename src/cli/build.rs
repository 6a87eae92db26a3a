//! `packline build`: run the standard stage list once.
//!
//! Build phases (see [`crate::stage`]):
//! - **Construct** - read template, favicon and vendor manifest
//! - **Setup** - clean output, link vendor library, start type checker
//! - **Graph** - load and transform every reachable module in parallel
//! - **Assets** - extract stylesheets, emit module code and side files
//! - **Emit** - render the entry document
//! - **Write** - write every asset, entry document last
//! - **Done** - collect type-check findings, print the report

use crate::config::PipelineConfig;
use crate::env::{EnvProjection, RawEnv};
use crate::log;
use crate::stage::{BuildOutput, Driver};
use anyhow::Result;

/// Build once and print the report.
pub fn build_app(config: &PipelineConfig, raw_env: &RawEnv) -> Result<BuildOutput> {
    let env = EnvProjection::project(raw_env, config.get_root(), &config.build.static_dir);
    let mode = if config.mode().is_dev() { "development" } else { "production" };
    crate::debug!(
        "env";
        "{} build, revision {}, base {}, api {}",
        mode,
        env.revision,
        env.base_path,
        env.api_prefix
    );

    let output = Driver::standard(config, &env)?.run()?;
    output.report.print(&output.assets);

    if output.report.filtered() > 0 {
        crate::debug!("stats"; "{} filtered warnings", output.report.filtered());
    }
    log!("build"; "wrote {}", config.build.output.display());
    Ok(output)
}
