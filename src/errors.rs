// src/errors.rs

//! Crate-wide error types.
//!
//! Only errors that abort the whole pipeline live here. Per-command
//! failures (launch errors, non-zero exits, callback errors) travel inside
//! [`crate::exec::CommandResult`] and are handled by the output drain.

use thiserror::Error;

pub use anyhow::Result;

/// Errors that abort the run, mapped to process exit codes by `main`.
#[derive(Debug, Error)]
pub enum FatalError {
    /// Stdin is a terminal, so there is nothing to read.
    #[error("expecting input on STDIN")]
    NoInput,

    /// Invalid combination or value of settings.
    ///
    /// NOTE: mutually-exclusive flags and a missing COMMAND are rejected by
    /// `clap` before we get here; this covers what the parser cannot see
    /// (e.g. a `-s` pattern that fails to compile).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The input scanner failed: a read error or an oversized record.
    #[error("reading input failed: {0}")]
    Scanner(String),

    /// I/O failure while draining results to the output sink.
    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

impl FatalError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::NoInput => 255,
            FatalError::Config(_) => 2,
            FatalError::Scanner(_) | FatalError::Pipeline(_) => 1,
        }
    }
}
