//! CLI support for the `slua` binary.
//!
//! Kept as a library module so embedding tools can reuse the check/run
//! plumbing without going through the binary.

mod check;
mod run;

pub use check::{execute_check, CheckOptions, CheckResult};
pub use run::{execute_run, RunOptions, RunOutcome};

use std::io;

/// Errors that can occur during CLI operations.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Script(#[from] crate::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No input provided. Pass a file or pipe a script to stdin.")]
    NoInput,
}

impl From<crate::SyntaxError> for CliError {
    fn from(e: crate::SyntaxError) -> Self {
        CliError::Script(crate::Error::Syntax(e))
    }
}

impl From<crate::RuntimeError> for CliError {
    fn from(e: crate::RuntimeError) -> Self {
        CliError::Script(crate::Error::Runtime(e))
    }
}
