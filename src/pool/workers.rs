// src/pool/workers.rs

//! The bounded worker pool.
//!
//! An enumerator assigns each incoming command its emission index, then `P`
//! workers consume from one shared work channel and execute synchronously.
//! Results are published on a bounded channel so a slow consumer applies
//! backpressure all the way to the scanner. Cancellation is observed only
//! at publish points; a child that has already started runs to completion.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::exec::{self, CommandResult, RunOptions};
use crate::pool::ordered;

/// One unit of work: the emission index, the command string, and (in
/// ordered mode) the single-shot slot the result must be delivered on.
pub(crate) struct WorkItem {
    pub index: usize,
    pub command: String,
    pub slot: Option<oneshot::Sender<CommandResult>>,
}

/// Spawn the execution pool over the command stream.
///
/// Results arrive on the returned channel in completion order, or in
/// emission order when `ordered` is set.
pub fn spawn_pool(
    commands: mpsc::Receiver<String>,
    opts: RunOptions,
    ordered: bool,
    waiting_multiplier: usize,
    cancel: CancellationToken,
) -> mpsc::Receiver<CommandResult> {
    if ordered {
        ordered::spawn_ordered_pool(commands, opts, waiting_multiplier, cancel)
    } else {
        spawn_unordered_pool(commands, opts, cancel)
    }
}

fn spawn_unordered_pool(
    mut commands: mpsc::Receiver<String>,
    opts: RunOptions,
    cancel: CancellationToken,
) -> mpsc::Receiver<CommandResult> {
    let procs = opts.procs.max(1);
    let (out_tx, out_rx) = mpsc::channel(procs);
    // Capacity 1: the producer blocks until a worker is free.
    let (work_tx, work_rx) = mpsc::channel::<WorkItem>(1);
    let work_rx = Arc::new(Mutex::new(work_rx));

    tokio::spawn(async move {
        let mut index = 0usize;
        while let Some(command) = commands.recv().await {
            let item = WorkItem {
                index,
                command,
                slot: None,
            };
            if work_tx.send(item).await.is_err() {
                break;
            }
            index += 1;
        }
    });

    for _ in 0..procs {
        let work_rx = Arc::clone(&work_rx);
        let out_tx = out_tx.clone();
        let opts = opts.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let item = { work_rx.lock().await.recv().await };
                let Some(item) = item else { break };
                let result = exec::run(&item.command, item.index, &opts).await;
                tokio::select! {
                    sent = out_tx.send(result) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("worker stopping on cancellation");
                        break;
                    }
                }
            }
        });
    }

    out_rx
}
