// src/lib.rs

pub mod cli;
pub mod config;
pub mod drain;
pub mod errors;
pub mod exec;
pub mod generate;
pub mod input;
pub mod logging;
pub mod pool;
pub mod template;

use std::io::IsTerminal;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::Settings;
use crate::drain::Summary;
use crate::errors::FatalError;
use crate::exec::RunOptions;
use crate::template::Template;

/// High-level entry point used by `main.rs`.
///
/// Checks that stdin is piped, resolves settings from the CLI and the
/// environment, then runs the pipeline over the real stdin/stdout.
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32, FatalError> {
    if std::io::stdin().is_terminal() {
        return Err(FatalError::NoInput);
    }
    let settings = Settings::from_args(&args)?;
    let summary = execute(&settings, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(summary.exit_code)
}

/// Run the whole pipeline: scan records from `reader`, expand the template,
/// execute commands under the worker pool, and stream results to `writer`.
///
/// In dry-run mode the expanded commands are written to `writer` instead,
/// one per line, and nothing executes.
pub async fn execute<R, W>(
    settings: &Settings,
    reader: R,
    writer: W,
) -> Result<Summary, FatalError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let template = Template::parse(&settings.template);
    let (commands, scanner) = generate::spawn_generator(settings, template, reader);

    if settings.dry_run {
        return dry_run(commands, scanner, writer).await;
    }

    let cancel = CancellationToken::new();
    let run_opts = RunOptions {
        shell: settings.shell.clone(),
        buffer_size: settings.buffer_size,
        retries: settings.retries,
        filter: None,
        remotes: Vec::new(),
        procs: settings.procs,
    };

    let results = pool::spawn_pool(
        commands,
        run_opts,
        settings.ordered,
        settings.waiting_multiplier,
        cancel.clone(),
    );

    let summary = drain::drain(results, writer, settings, &cancel).await?;
    reap_scanner(scanner).await?;

    debug!(
        exit_code = summary.exit_code,
        failures = summary.failures,
        "pipeline finished"
    );
    Ok(summary)
}

async fn dry_run<W>(
    mut commands: mpsc::Receiver<String>,
    scanner: JoinHandle<Result<()>>,
    writer: W,
) -> Result<Summary, FatalError>
where
    W: AsyncWrite + Unpin,
{
    let mut out = tokio::io::BufWriter::new(writer);
    while let Some(command) = commands.recv().await {
        out.write_all(command.as_bytes())
            .await
            .context("writing dry-run output")?;
        out.write_all(b"\n").await.context("writing dry-run output")?;
    }
    out.flush().await.context("flushing dry-run output")?;
    reap_scanner(scanner).await?;
    Ok(Summary::default())
}

/// Surface a fatal scanner failure once the pipeline has wound down.
async fn reap_scanner(scanner: JoinHandle<Result<()>>) -> Result<(), FatalError> {
    match scanner.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(FatalError::Scanner(format!("{err:#}"))),
        Err(err) if err.is_panic() => {
            Err(FatalError::Scanner(format!("scanner task panicked: {err}")))
        }
        Err(_) => Ok(()),
    }
}
