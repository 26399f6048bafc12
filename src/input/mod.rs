// src/input/mod.rs

//! Input record scanning.

mod scanner;

pub use scanner::{RecordScanner, MAX_RECORD_BYTES};
