// src/drain.rs

//! The output drain: the single consumer of command results.
//!
//! Streams each result's captured stdout to the output sink, tracks the
//! worst exit code seen, writes the command log, and enforces the
//! stop-on-error policy. The worst-exit-code counter is written here and
//! nowhere else.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Settings;
use crate::exec::CommandResult;

/// How often the output sink is flushed while results stream through.
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Aggregate outcome of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    /// Highest exit code observed across all commands; becomes the process
    /// exit code.
    pub exit_code: i32,
    /// Number of failed commands.
    pub failures: u64,
}

/// Consume results until the channel closes (or stop-on-error trips),
/// streaming stdout to `sink` and recording commands to the log.
pub async fn drain<W>(
    mut results: mpsc::Receiver<CommandResult>,
    sink: W,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<Summary>
where
    W: AsyncWrite + Unpin,
{
    let mut out = BufWriter::new(sink);
    let mut log = match &settings.log_path {
        Some(path) => Some(CommandLog::create(path).await?),
        None => None,
    };

    let mut summary = Summary::default();
    let mut last_flush = Instant::now();

    while let Some(mut result) = results.recv().await {
        let failed = result.exit_code() != 0;
        if failed {
            eprintln!("ERROR with command: {result}");
            summary.exit_code = summary.exit_code.max(result.exit_code());
            summary.failures += 1;
            if settings.stop_on_error {
                cancel.cancel();
                break;
            }
        }
        if settings.verbose {
            eprintln!("{result}");
        }

        result
            .copy_stdout_to(&mut out)
            .await
            .context("writing command output")?;

        // Dropping the result releases its temp file before the next result
        // is handled.
        let command = result.command().to_string();
        drop(result);

        if last_flush.elapsed() >= FLUSH_INTERVAL {
            out.flush().await.context("flushing output")?;
            last_flush = Instant::now();
        }
        if let Some(log) = &mut log {
            log.record(&command, !failed).await?;
        }
    }

    out.flush().await.context("flushing output")?;

    if let Some(log) = &mut log {
        log.finish(&summary).await?;
    }

    debug!(
        exit_code = summary.exit_code,
        failures = summary.failures,
        "drain finished"
    );
    Ok(summary)
}

/// Append-only command log.
///
/// Successful commands are prefixed with `# ` (continuation lines
/// included); failed commands are written bare. A trailer records the
/// overall outcome.
struct CommandLog {
    file: File,
}

impl CommandLog {
    async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .with_context(|| format!("creating command log at {}", path.display()))?;
        Ok(Self { file })
    }

    async fn record(&mut self, command: &str, success: bool) -> Result<()> {
        let line = if success {
            format!("# {}\n", command.replace('\n', "\n# "))
        } else {
            format!("{command}\n")
        };
        self.file
            .write_all(line.as_bytes())
            .await
            .context("writing command log")
    }

    async fn finish(&mut self, summary: &Summary) -> Result<()> {
        let trailer = if summary.exit_code == 0 {
            "# SUCCESS\n".to_string()
        } else {
            format!("# FAILED {} commands\n", summary.failures)
        };
        self.file
            .write_all(trailer.as_bytes())
            .await
            .context("writing command log trailer")?;
        self.file.flush().await.context("flushing command log")
    }
}
