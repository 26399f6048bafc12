// src/exec/remote.rs

//! Remote worker descriptors.
//!
//! Each remote carries a live in-flight counter. A command is dispatched to
//! the first remote with fewer than `procs / (remotes + 1)` commands in
//! flight; when every remote is at capacity the command runs locally. The
//! transport is an opaque seam that produces a prepared
//! [`tokio::process::Command`] (for example an `ssh user@host` invocation);
//! no transport implementation ships here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::process::Command;

/// Builds the process invocation that executes a command line on a remote.
pub trait RemoteTransport: Send + Sync {
    fn command(&self, command_line: &str) -> Result<Command>;
}

/// One remote execution target with its live in-flight counter.
pub struct RemoteWorker {
    label: String,
    in_flight: AtomicUsize,
    transport: Box<dyn RemoteTransport>,
}

impl RemoteWorker {
    pub fn new(label: impl Into<String>, transport: Box<dyn RemoteTransport>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            in_flight: AtomicUsize::new(0),
            transport,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Commands currently dispatched to this remote.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Build the invocation for one command line.
    pub fn command(&self, command_line: &str) -> Result<Command> {
        self.transport.command(command_line)
    }
}

/// A claimed slot on a remote; the in-flight counter drops with it.
pub struct InFlightGuard {
    worker: Arc<RemoteWorker>,
}

impl InFlightGuard {
    pub fn worker(&self) -> &Arc<RemoteWorker> {
        &self.worker
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.worker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pick a remote for the next command, or `None` to run locally.
pub fn pick_remote(remotes: &[Arc<RemoteWorker>], procs: usize) -> Option<InFlightGuard> {
    if remotes.is_empty() {
        return None;
    }
    let per_host = procs / (remotes.len() + 1);
    for worker in remotes {
        if worker.in_flight.load(Ordering::SeqCst) < per_host {
            worker.in_flight.fetch_add(1, Ordering::SeqCst);
            return Some(InFlightGuard {
                worker: Arc::clone(worker),
            });
        }
    }
    None
}
