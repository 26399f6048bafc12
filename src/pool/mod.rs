// src/pool/mod.rs

//! Bounded parallel execution of the command stream.

mod ordered;
mod workers;

pub use workers::spawn_pool;
