//! External command execution.
//!
//! Builder-based API for running checker processes with their output
//! captured.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Resolve the program through PATH and project-local bins
//! let output = Cmd::from_slice(&["tsc", "--noEmit"])
//!     .cwd(root)
//!     .search_path(root.join("node_modules/.bin"))
//!     .capture()?;
//! ```

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Output},
    sync::LazyLock,
};

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Debug, Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Cmd {
    /// Create from a command array (e.g., `["tsc"]` or `["npx", "tsc"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Extra directory searched before `PATH` (e.g. `node_modules/.bin`).
    pub fn search_path<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.search_paths.push(dir.as_ref().to_owned());
        self
    }

    /// Get the program name for error messages.
    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Locate the program: extra search paths first, then `PATH`.
    pub fn resolve_program(&self) -> Result<PathBuf> {
        let name = self.program_name();
        if name.is_empty() {
            bail!("empty command");
        }
        for dir in &self.search_paths {
            if let Ok(found) = which::which_in(&self.program, Some(dir), dir) {
                return Ok(found);
            }
        }
        which::which(&self.program).with_context(|| format!("`{name}` not found in PATH"))
    }

    /// Run to completion and capture output, whatever the exit status.
    ///
    /// Fails only when the process cannot be started.
    pub fn capture(self) -> Result<Output> {
        let name = self.program_name();
        let program = self.resolve_program()?;

        let mut cmd = Command::new(program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        cmd.output()
            .with_context(|| format!("Failed to execute `{name}`"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\x1b\[[0-9;]*m").unwrap()
});

/// Strip ANSI escape codes from string.
pub fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    ANSI.replace_all(s, "")
}

/// Combined stdout and stderr of a finished process, without colors.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    strip_ansi(&text).into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_and_cwd() {
        let cmd = Cmd::from_slice(&["tsc", "--noEmit"]).cwd("/tmp");
        assert_eq!(cmd.program, OsString::from("tsc"));
        assert_eq!(cmd.args, vec![OsString::from("--noEmit")]);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
        assert!(Cmd::from_slice::<&str>(&[]).resolve_program().is_err());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }

    #[test]
    fn test_missing_program() {
        let err = Cmd::from_slice(&["packline-no-such-program"])
            .capture()
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_keeps_failure_output() {
        let output = Cmd::from_slice(&["sh", "-c", "echo out; echo err >&2; exit 2"])
            .capture()
            .unwrap();
        assert!(!output.status.success());
        let text = combined_output(&output);
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }
}
