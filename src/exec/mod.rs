// src/exec/mod.rs

//! Command execution: one command at a time, with stdout capture,
//! spill-to-disk for large outputs, retries, and an optional remote
//! dispatch seam.

mod capture;
mod remote;
mod runner;

pub use capture::CapturedOutput;
pub use remote::{pick_remote, InFlightGuard, RemoteTransport, RemoteWorker};
pub use runner::{run, CommandResult, RunOptions, StdoutFilter, UNKNOWN_EXIT};
