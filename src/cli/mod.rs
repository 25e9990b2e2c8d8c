//! Command Line Interface (CLI) layer for s1ard.
//!
//! Argument parsing (`args`), CLI errors and their exit codes (`errors`),
//! and logging setup plus dispatch to `s1ard::api` (`runner`).
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::{init_logging, run};
