// src/pool/ordered.rs

//! The ordering coordinator: restores emission order on the output side.
//!
//! The enumerator allocates a single-shot slot per command and queues the
//! receiving half on a bounded FIFO before the command reaches a worker.
//! A forwarder awaits slots in FIFO order, so results are released in
//! emission order no matter when they complete. The FIFO bound caps how
//! many finished commands can pile up behind a slow predecessor; once it
//! is full the enumerator blocks, which in turn throttles the scanner.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::exec::{self, CommandResult, RunOptions};
use crate::pool::workers::WorkItem;

pub(crate) fn spawn_ordered_pool(
    mut commands: mpsc::Receiver<String>,
    opts: RunOptions,
    waiting_multiplier: usize,
    cancel: CancellationToken,
) -> mpsc::Receiver<CommandResult> {
    let procs = opts.procs.max(1);
    let (out_tx, out_rx) = mpsc::channel(procs);
    let (work_tx, work_rx) = mpsc::channel::<WorkItem>(1);
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (slot_tx, mut slot_rx) = mpsc::channel::<oneshot::Receiver<CommandResult>>(
        waiting_multiplier.max(1) * procs,
    );

    // Enumerator: queue the slot first so the forwarder sees slots in
    // emission order, then hand the command to a worker.
    tokio::spawn(async move {
        let mut index = 0usize;
        while let Some(command) = commands.recv().await {
            let (tx, rx) = oneshot::channel();
            if slot_tx.send(rx).await.is_err() {
                break;
            }
            let item = WorkItem {
                index,
                command,
                slot: Some(tx),
            };
            if work_tx.send(item).await.is_err() {
                break;
            }
            index += 1;
        }
    });

    for _ in 0..procs {
        let work_rx = Arc::clone(&work_rx);
        let opts = opts.clone();
        tokio::spawn(async move {
            loop {
                let item = { work_rx.lock().await.recv().await };
                let Some(item) = item else { break };
                let result = exec::run(&item.command, item.index, &opts).await;
                if let Some(slot) = item.slot {
                    // The receiving half may be gone after cancellation.
                    let _ = slot.send(result);
                }
            }
        });
    }

    // Forwarder: release results strictly in emission order.
    tokio::spawn(async move {
        while let Some(slot) = slot_rx.recv().await {
            let result = match slot.await {
                Ok(result) => result,
                // The worker dropped the slot without a result (shutdown).
                Err(_) => continue,
            };
            tokio::select! {
                sent = out_tx.send(result) => {
                    if sent.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("ordered forwarder stopping on cancellation");
                    break;
                }
            }
        }
    });

    out_rx
}
