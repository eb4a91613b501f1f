//! Command-line interface for ci-forge.
//!
//! Provides the benchmark, ground-truth functional test and single-file lint
//! commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
