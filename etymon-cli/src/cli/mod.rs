//! Command-line interface orchestration for etymon.
//!
//! `fetch` crawls glyph images into a directory tree, `build` and `pack` turn
//! crawled trees into store partitions, and `inspect` reports what a partition
//! holds.

mod commands;

pub use commands::{
    BuildCommand, Cli, CliError, Command, ExecutionSummary, FetchCommand, GeometryArgs,
    InspectCommand, InspectSummary, PackCommand, PartitionSummary, render_summary, run_cli,
};

#[cfg(test)]
mod test_helpers;
