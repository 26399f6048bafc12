// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for `fanout`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fanout",
    version,
    about = "Run a command template over records from stdin, in parallel.",
    long_about = None
)]
pub struct CliArgs {
    /// Number of worker processes.
    #[arg(short = 'p', long = "procs", value_name = "N", default_value_t = 1)]
    pub procs: usize,

    /// Number of records consumed by each command. -n and -s are mutually
    /// exclusive.
    #[arg(short = 'n', long = "nlines", value_name = "N", conflicts_with = "sep")]
    pub nlines: Option<usize>,

    /// Regular expression used to split each record into template tokens.
    /// -s and -n are mutually exclusive.
    #[arg(short = 's', long = "sep", value_name = "REGEX")]
    pub sep: Option<String>,

    /// Number of times to retry a command that exits non-zero.
    #[arg(short = 'r', long = "retry", value_name = "N", default_value_t = 0)]
    pub retries: u32,

    /// Keep output in the same order as the input.
    #[arg(short = 'o', long = "ordered")]
    pub ordered: bool,

    /// Print each command to stderr after it completes.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Stop execution on the first failing command. Default is to report
    /// errors and keep going.
    #[arg(long = "stop-on-error")]
    pub stop_on_error: bool,

    /// Print the expanded commands without running them.
    #[arg(short = 'd', long = "dry-run")]
    pub dry_run: bool,

    /// File to log commands to. Successful commands are prefixed with '# '.
    #[arg(short = 'l', long = "log", value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Command template; `{}` expands to the whole record.
    #[arg(value_name = "COMMAND", required = true)]
    pub command: String,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
