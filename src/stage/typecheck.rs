//! `type-check`: the background type checker.
//!
//! The checker starts in `setup` on its own thread and runs while modules
//! are transformed (type annotations are stripped without being checked).
//! Its findings are collected in `done`, after the output was written, and
//! reported as advisories. They never fail the build.

use super::{BuildContext, Stage};
use crate::config::PipelineConfig;
use crate::report::Diagnostic;
use crate::utils::exec::{Cmd, combined_output};
use anyhow::Result;
use crossbeam::channel::{self, Receiver};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::thread;

/// `src/app.ts(3,7): error TS2322: Type 'string' is not assignable ...`
static TSC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(.+?)\((\d+),(\d+)\): ((?:error|warning|message) TS\d+: .*)$").unwrap()
});

pub struct TypeCheck {
    command: Option<Vec<String>>,
    root: PathBuf,
    findings: Option<Receiver<Vec<Diagnostic>>>,
}

impl TypeCheck {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            command: config
                .typecheck
                .enable
                .then(|| config.typecheck.command.clone()),
            root: config.get_root().to_path_buf(),
            findings: None,
        }
    }
}

/// Run the checker to completion and turn its output into advisories.
fn check(command: &[String], root: PathBuf) -> Vec<Diagnostic> {
    let name = command.first().cloned().unwrap_or_default();
    let output = Cmd::from_slice(command)
        .cwd(&root)
        .search_path(root.join("node_modules/.bin"))
        .capture();

    match output {
        Ok(output) if output.status.success() => Vec::new(),
        Ok(output) => {
            let text = combined_output(&output);
            let findings = parse_findings(&text);
            if findings.is_empty() {
                vec![Diagnostic::advisory(
                    Some(name),
                    format!("exited with {}\n{}", output.status, text.trim()),
                )]
            } else {
                findings
            }
        }
        Err(e) => vec![Diagnostic::advisory(
            Some(name),
            format!("type checker did not run: {e:#}"),
        )],
    }
}

/// Parse `tsc --pretty false` output. Indented lines continue the previous
/// finding.
fn parse_findings(text: &str) -> Vec<Diagnostic> {
    let mut findings: Vec<Diagnostic> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = TSC_LINE.captures(line) {
            findings.push(Diagnostic::advisory(
                Some(format!("{}:{}:{}", &caps[1], &caps[2], &caps[3])),
                &caps[4],
            ));
        } else if line.starts_with(char::is_whitespace)
            && !line.trim().is_empty()
            && let Some(last) = findings.last_mut()
        {
            last.message.push('\n');
            last.message.push_str(line);
        }
    }
    findings
}

impl Stage for TypeCheck {
    fn name(&self) -> &'static str {
        "type-check"
    }

    fn setup(&mut self, _ctx: &mut BuildContext<'_>) -> Result<()> {
        let Some(command) = self.command.clone() else {
            return Ok(());
        };
        let root = self.root.clone();
        let (tx, rx) = channel::bounded(1);
        thread::Builder::new()
            .name("type-check".into())
            .spawn(move || {
                crate::debug!("typecheck"; "running {}", command.join(" "));
                let _ = tx.send(check(&command, root));
            })?;
        self.findings = Some(rx);
        Ok(())
    }

    fn done(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let Some(rx) = self.findings.take() else {
            return Ok(());
        };
        match rx.recv() {
            Ok(findings) => ctx.report.extend(findings),
            Err(_) => ctx.report.push(Diagnostic::advisory(
                Some(self.name().into()),
                "type checker thread exited without a result",
            )),
        }
        Ok(())
    }
}
