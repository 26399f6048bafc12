// src/exec/runner.rs

//! Execution of a single command string: shell spawn, stdout capture,
//! exit-code derivation, and the retry loop.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::exec::capture::CapturedOutput;
use crate::exec::remote::{pick_remote, RemoteWorker};

/// Exit code reported when the real status of the command is unknown
/// (launch failure, death by signal).
pub const UNKNOWN_EXIT: i32 = 1;

/// Optional transformation of a command's stdout stream before capture.
///
/// The filter reads the raw child stdout from `input` and writes the
/// processed stream to `output`; whatever it writes is what gets captured.
/// The runner closes the writer once the filter returns.
#[async_trait]
pub trait StdoutFilter: Send + Sync {
    async fn apply(
        &self,
        input: &mut (dyn AsyncRead + Send + Unpin),
        output: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()>;
}

/// Options controlling how commands are executed.
#[derive(Clone)]
pub struct RunOptions {
    /// Shell binary invoked as `<shell> -c <command>`.
    pub shell: String,
    /// In-memory capture threshold before spilling to a temp file.
    pub buffer_size: usize,
    /// Times a non-zero command is re-executed before giving up.
    pub retries: u32,
    /// Optional stdout post-processing step.
    pub filter: Option<Arc<dyn StdoutFilter>>,
    /// Remote workers eligible to take commands.
    pub remotes: Vec<Arc<RemoteWorker>>,
    /// Worker-pool size; feeds the remote selection rule.
    pub procs: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            buffer_size: crate::config::DEFAULT_BUFFER_SIZE,
            retries: 0,
            filter: None,
            remotes: Vec::new(),
            procs: 1,
        }
    }
}

/// The outcome of executing one command: the final attempt's captured
/// stdout, exit code, and error, plus the wall-clock duration across all
/// attempts.
///
/// Dropping the result releases the backing temp file, if any.
pub struct CommandResult {
    output: CapturedOutput,
    exit_code: i32,
    err: Option<anyhow::Error>,
    command: String,
    duration: Duration,
}

impl CommandResult {
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        self.err.as_ref()
    }

    /// Copy the captured stdout to `sink` in full.
    pub async fn copy_stdout_to<W>(&mut self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.output.copy_to(sink).await
    }

    /// Path of the backing temp file, when the output spilled.
    pub fn spill_path(&self) -> Option<&std::path::Path> {
        self.output.spill_path()
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmd = if self.command.chars().count() > 100 {
            let mut short: String = self.command.chars().take(80).collect();
            short.push_str("...");
            short
        } else {
            self.command.clone()
        };
        let head = String::from_utf8_lossy(&self.output.head()).replace('\n', "\\n");

        write!(f, "Command('{}', stdout[:20]: '{}'", cmd, head)?;
        if self.exit_code != 0 {
            write!(f, ", exit-code: {}", self.exit_code)?;
        }
        if let Some(err) = &self.err {
            write!(f, ", error: {err:#}")?;
        }
        write!(f, ", run-time: {:?})", self.duration)
    }
}

/// Execute `command`, re-running it while it fails and retries remain.
///
/// `index` is the command's emission index, passed to the child as
/// `PROCESS_I`. The returned result is the final attempt's; the duration
/// spans all attempts. A remote slot, once claimed, is held for every
/// attempt of this command.
pub async fn run(command: &str, index: usize, opts: &RunOptions) -> CommandResult {
    let started = Instant::now();
    let env = [("PROCESS_I".to_string(), index.to_string())];

    let slot = pick_remote(&opts.remotes, opts.procs);
    let remote = slot.as_ref().map(|guard| guard.worker());

    let mut result = one_run(command, opts, &env, remote).await;
    let mut retries = opts.retries;
    while retries > 0 && result.exit_code != 0 {
        retries -= 1;
        debug!(command, retries_left = retries, "retrying failed command");
        result = one_run(command, opts, &env, remote).await;
    }
    result.duration = started.elapsed();
    result
}

async fn one_run(
    command: &str,
    opts: &RunOptions,
    env: &[(String, String)],
    remote: Option<&Arc<RemoteWorker>>,
) -> CommandResult {
    let mut cmd = match remote {
        Some(worker) => match worker.command(command) {
            Ok(cmd) => cmd,
            Err(err) => {
                warn!(
                    remote = worker.label(),
                    error = %err,
                    "remote unavailable, running locally"
                );
                local_command(&opts.shell, command)
            }
        },
        None => local_command(&opts.shell, command),
    };

    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            return failed_result(
                command,
                anyhow::Error::from(err).context(format!("starting `{command}`")),
            );
        }
    };

    let Some(mut stdout) = child.stdout.take() else {
        return failed_result(command, anyhow!("child has no stdout pipe"));
    };

    // With a filter configured, splice it between the child and the capture
    // through an in-process pipe; its error is collected on the side.
    let (capture_res, filter_err) = match &opts.filter {
        Some(filter) => {
            let filter = Arc::clone(filter);
            let (mut filter_out, mut capture_in) = tokio::io::duplex(64 * 1024);
            let (err_tx, err_rx) = oneshot::channel();
            let writer = tokio::spawn(async move {
                let res = filter.apply(&mut stdout, &mut filter_out).await;
                // Dropping the writer is what delivers EOF to the capture.
                drop(filter_out);
                let _ = err_tx.send(res);
            });
            let capture = CapturedOutput::read_from(&mut capture_in, opts.buffer_size).await;
            let _ = writer.await;
            let ferr = match err_rx.await {
                Ok(Err(err)) => Some(err),
                _ => None,
            };
            (capture, ferr)
        }
        None => (
            CapturedOutput::read_from(&mut stdout, opts.buffer_size).await,
            None,
        ),
    };

    let output = match capture_res {
        Ok(output) => output,
        Err(err) => {
            // Capture failed; still reap the child.
            let _ = child.wait().await;
            return failed_result(command, err);
        }
    };

    // The pipe is drained; now reap the child for its status.
    let (exit_code, err) = match child.wait().await {
        Ok(status) => match status.code() {
            Some(code) => (code, None),
            None => (
                UNKNOWN_EXIT,
                Some(anyhow!("`{command}` terminated by signal")),
            ),
        },
        Err(wait_err) => (
            UNKNOWN_EXIT,
            Some(anyhow::Error::from(wait_err).context(format!("waiting for `{command}`"))),
        ),
    };

    // A filter error only surfaces when the child itself succeeded.
    let (exit_code, err) = match (exit_code, err, filter_err) {
        (0, None, Some(ferr)) => (UNKNOWN_EXIT, Some(ferr)),
        (code, child_err, _) => (code, child_err),
    };

    CommandResult {
        output,
        exit_code,
        err,
        command: command.to_string(),
        duration: Duration::default(),
    }
}

fn local_command(shell: &str, command: &str) -> Command {
    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(command);
    cmd
}

fn failed_result(command: &str, err: anyhow::Error) -> CommandResult {
    CommandResult {
        output: CapturedOutput::Memory(Vec::new()),
        exit_code: UNKNOWN_EXIT,
        err: Some(err),
        command: command.to_string(),
        duration: Duration::default(),
    }
}
