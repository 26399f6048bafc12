// src/config.rs

//! Runtime settings assembled from CLI arguments and the environment.
//!
//! Environment inputs:
//! - `SHELL` — shell binary used as `<shell> -c <command>` (default `sh`)
//! - `RS` — input record separator; unset means newline records
//! - `FS` — separator joining grouped records for `{Line}` (default space)

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::cli::CliArgs;
use crate::errors::FatalError;

/// How much of a child's stdout is kept in memory before spilling to a
/// temp file.
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 20;

/// In ordered mode, how many finished commands may wait on a slower
/// predecessor, as a multiple of the worker count. Raising this trades
/// memory for tolerance of stragglers.
pub const DEFAULT_WAITING_MULTIPLIER: usize = 4;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("constant regex pattern is valid"));

/// How records are turned into template bindings.
#[derive(Debug, Clone)]
pub enum Grouping {
    /// Split each record into tokens with this regex; one command per record.
    Split(Regex),
    /// Collect this many records per command.
    Lines(usize),
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub procs: usize,
    pub grouping: Grouping,
    pub retries: u32,
    pub ordered: bool,
    pub verbose: bool,
    pub stop_on_error: bool,
    pub dry_run: bool,
    pub log_path: Option<PathBuf>,
    /// The raw command template string.
    pub template: String,
    /// Shell binary invoked as `<shell> -c <command>`.
    pub shell: String,
    /// Input record separator; `None` means newline records.
    pub record_sep: Option<Vec<u8>>,
    /// Separator joining grouped records for the `{Line}` binding.
    pub field_sep: String,
    pub buffer_size: usize,
    pub waiting_multiplier: usize,
}

impl Settings {
    /// Settings with defaults for everything but the command template:
    /// one worker, split on whitespace, no retries, local shell `sh`.
    ///
    /// The environment is not consulted here; [`Settings::from_args`] is the
    /// CLI entry point that layers it in.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            procs: 1,
            grouping: Grouping::Split(WHITESPACE.clone()),
            retries: 0,
            ordered: false,
            verbose: false,
            stop_on_error: false,
            dry_run: false,
            log_path: None,
            template: template.into(),
            shell: "sh".to_string(),
            record_sep: None,
            field_sep: " ".to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            waiting_multiplier: DEFAULT_WAITING_MULTIPLIER,
        }
    }

    /// Build settings from parsed CLI arguments plus the environment.
    pub fn from_args(args: &CliArgs) -> Result<Self, FatalError> {
        if args.procs == 0 {
            return Err(FatalError::Config("-p must be at least 1".into()));
        }
        if args.nlines == Some(0) {
            return Err(FatalError::Config("-n must be at least 1".into()));
        }

        let grouping = match (&args.sep, args.nlines) {
            // clap's conflicts_with normally rejects this combination first.
            (Some(_), Some(_)) => {
                return Err(FatalError::Config(
                    "-s and -n are mutually exclusive".into(),
                ));
            }
            (Some(pattern), None) => Grouping::Split(compile_sep(pattern)?),
            (None, Some(n)) => Grouping::Lines(n),
            // Neither mode requested: one command per record, split on
            // whitespace.
            (None, None) => Grouping::Split(WHITESPACE.clone()),
        };

        let mut settings = Settings::new(&args.command);
        settings.procs = args.procs;
        settings.grouping = grouping;
        settings.retries = args.retries;
        settings.ordered = args.ordered;
        settings.verbose = args.verbose;
        settings.stop_on_error = args.stop_on_error;
        settings.dry_run = args.dry_run;
        settings.log_path = args.log.clone();
        settings.shell = env_or("SHELL", "sh");
        settings.record_sep = std::env::var("RS")
            .ok()
            .filter(|s| !s.is_empty())
            .map(String::into_bytes);
        settings.field_sep = env_or("FS", " ");
        Ok(settings)
    }
}

fn compile_sep(pattern: &str) -> Result<Regex, FatalError> {
    Regex::new(pattern)
        .map_err(|e| FatalError::Config(format!("invalid -s regex '{pattern}': {e}")))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}
