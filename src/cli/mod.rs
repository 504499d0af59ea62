//! CLI support for docpipe
//!
//! Command implementations live in `main.rs`; this module provides signal
//! handling for graceful shutdown of an in-flight run.

pub mod signals;

pub use signals::{CancellationToken, setup_signal_handlers};
