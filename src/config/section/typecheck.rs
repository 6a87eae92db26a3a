//! `[typecheck]` section: the background type checker.
//!
//! ```toml
//! [typecheck]
//! enable = true
//! command = ["tsc", "--noEmit", "--pretty", "false"]
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypecheckConfig {
    pub enable: bool,

    /// Checker command, run in the config directory.
    pub command: Vec<String>,
}

impl Default for TypecheckConfig {
    fn default() -> Self {
        Self {
            enable: true,
            command: vec![
                "tsc".into(),
                "--noEmit".into(),
                "--pretty".into(),
                "false".into(),
            ],
        }
    }
}

impl TypecheckConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.enable && self.command.is_empty() {
            diag.error(FieldPath::new("typecheck.command"), "must not be empty");
        }
    }
}
