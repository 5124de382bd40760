//! Command-line interface for idc-sampler.
//!
//! Provides the `sample`, `inspect` and `check` commands.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
